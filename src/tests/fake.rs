//! In-memory [`Cluster`] for exercising collection without an API server.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

use k8s_openapi::api::core::v1::{Container, ContainerStatus, Pod, PodSpec, PodStatus};
use kube::api::{DynamicObject, ListParams, LogParams};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::ResourceExt;
use serde_json::json;
use tokio::io::AsyncWrite;

use crate::cluster::{Cluster, LogCopyError, copy_stream};

pub fn api_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

/// An object shaped like a list item: no apiVersion/kind, but a resourceVersion.
pub fn object(namespace: &str, name: &str, labels: &[(&str, &str)]) -> DynamicObject {
    let labels: BTreeMap<_, _> = labels.iter().cloned().collect();
    let mut metadata = json!({
        "name": name,
        "labels": labels,
        "resourceVersion": "4242",
        "uid": format!("uid-{}", name),
    });
    if !namespace.is_empty() {
        metadata["namespace"] = json!(namespace);
    }
    serde_json::from_value(json!({
        "metadata": metadata,
        "spec": { "replicas": 1 },
    }))
    .unwrap()
}

/// A pod with the given containers and their restart counts.
pub fn pod(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    containers: &[(&str, i32)],
) -> Pod {
    let mut p = Pod::default();
    p.metadata.name = Some(name.to_string());
    p.metadata.namespace = Some(namespace.to_string());
    p.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    p.spec = Some(PodSpec {
        containers: containers
            .iter()
            .map(|(c, _)| Container {
                name: c.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    });
    p.status = Some(PodStatus {
        container_statuses: Some(
            containers
                .iter()
                .map(|(c, restarts)| ContainerStatus {
                    name: c.to_string(),
                    restart_count: *restarts,
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    });
    p
}

fn fake_error(msg: &str) -> kube::Error {
    kube::Error::Service(Box::new(std::io::Error::other(msg.to_string())))
}

/// Evaluate a `k=v,k2!=v2` selector the way the API server would.
fn matches_labels(selector: Option<&str>, labels: &BTreeMap<String, String>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').filter(|s| !s.is_empty()).all(|term| {
        if let Some((k, v)) = term.split_once("!=") {
            labels.get(k).map(String::as_str) != Some(v)
        } else if let Some((k, v)) = term.split_once('=') {
            labels.get(k).map(String::as_str) == Some(v)
        } else {
            false
        }
    })
}

fn matches_fields(selector: Option<&str>, namespace: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').filter(|s| !s.is_empty()).all(|term| {
        match term.split_once('=') {
            Some(("metadata.namespace", ns)) => namespace.unwrap_or("") == ns,
            _ => false,
        }
    })
}

#[derive(Default)]
pub struct FakeCluster {
    resources: Vec<ApiResource>,
    objects: RefCell<HashMap<(String, String), Vec<DynamicObject>>>,
    pods: RefCell<Vec<Pod>>,
    logs: RefCell<HashMap<(String, String, String, bool), String>>,

    discovery_fails: Cell<bool>,
    failing_lists: RefCell<HashSet<String>>,
    failing_logs: RefCell<HashSet<(String, String)>>,

    discover_calls: Cell<usize>,
    list_object_calls: Cell<usize>,
    list_pod_calls: Cell<usize>,
    log_requests: RefCell<Vec<(String, LogParams)>>,
}

impl FakeCluster {
    pub fn new(resources: Vec<ApiResource>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    pub fn add_object(&self, ar: &ApiResource, obj: DynamicObject) {
        self.objects
            .borrow_mut()
            .entry((ar.group.clone(), ar.plural.clone()))
            .or_default()
            .push(obj);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.pods.borrow_mut().push(pod);
    }

    pub fn set_log(&self, namespace: &str, pod: &str, container: &str, previous: bool, body: &str) {
        self.logs.borrow_mut().insert(
            (
                namespace.to_string(),
                pod.to_string(),
                container.to_string(),
                previous,
            ),
            body.to_string(),
        );
    }

    pub fn fail_discovery(&self) {
        self.discovery_fails.set(true);
    }

    pub fn fail_list(&self, plural: &str) {
        self.failing_lists.borrow_mut().insert(plural.to_string());
    }

    pub fn fail_logs(&self, pod: &str, container: &str) {
        self.failing_logs
            .borrow_mut()
            .insert((pod.to_string(), container.to_string()));
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.get()
    }

    pub fn list_object_calls(&self) -> usize {
        self.list_object_calls.get()
    }

    pub fn list_pod_calls(&self) -> usize {
        self.list_pod_calls.get()
    }

    /// `(pod, params)` for every log request, in order.
    pub fn log_requests(&self) -> Vec<(String, LogParams)> {
        self.log_requests.borrow().clone()
    }
}

impl Cluster for FakeCluster {
    async fn discover(&self) -> kube::Result<Vec<ApiResource>> {
        self.discover_calls.set(self.discover_calls.get() + 1);
        if self.discovery_fails.get() {
            return Err(fake_error("discovery unavailable"));
        }
        Ok(self.resources.clone())
    }

    async fn list_objects(
        &self,
        resource: &ApiResource,
        params: &ListParams,
    ) -> kube::Result<Vec<DynamicObject>> {
        self.list_object_calls.set(self.list_object_calls.get() + 1);
        if self.failing_lists.borrow().contains(&resource.plural) {
            return Err(fake_error("forbidden"));
        }
        let objects = self.objects.borrow();
        let items = objects
            .get(&(resource.group.clone(), resource.plural.clone()))
            .map(|items| {
                items
                    .iter()
                    .filter(|o| matches_labels(params.label_selector.as_deref(), o.labels()))
                    .filter(|o| {
                        matches_fields(
                            params.field_selector.as_deref(),
                            o.metadata.namespace.as_deref(),
                        )
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> kube::Result<Vec<Pod>> {
        self.list_pod_calls.set(self.list_pod_calls.get() + 1);
        if self.failing_lists.borrow().contains("pods") {
            return Err(fake_error("forbidden"));
        }
        Ok(self
            .pods
            .borrow()
            .iter()
            .filter(|p| namespace.is_none() || p.metadata.namespace.as_deref() == namespace)
            .filter(|p| matches_labels(params.label_selector.as_deref(), p.labels()))
            .cloned()
            .collect())
    }

    async fn copy_logs<W>(
        &self,
        namespace: &str,
        pod: &str,
        params: &LogParams,
        out: &mut W,
    ) -> Result<u64, LogCopyError>
    where
        W: AsyncWrite + Unpin,
    {
        self.log_requests
            .borrow_mut()
            .push((pod.to_string(), params.clone()));
        let container = params.container.clone().unwrap_or_default();
        if self
            .failing_logs
            .borrow()
            .contains(&(pod.to_string(), container.clone()))
        {
            return Err(fake_error("container not found").into());
        }
        let body = self
            .logs
            .borrow()
            .get(&(
                namespace.to_string(),
                pod.to_string(),
                container,
                params.previous,
            ))
            .cloned()
            .unwrap_or_default();
        let copied = copy_stream(futures::io::Cursor::new(body.into_bytes()), out).await?;
        Ok(copied)
    }
}
