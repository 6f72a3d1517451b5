use futures::io::{AsyncRead, AsyncReadExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DynamicObject, ListParams, LogParams, ObjectList};
use kube::core::GroupVersion;
use kube::discovery::{self, ApiCapabilities, ApiResource, verbs};
use kube::{Api, Client};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

const PAGE_SIZE: u32 = 500;
const COPY_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum LogCopyError {
    #[error(transparent)]
    Api(#[from] kube::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The API calls a snapshot needs from a cluster.
///
/// Futures are not required to be `Send`; a session drives them one at a time.
#[allow(async_fn_in_trait)]
pub trait Cluster {
    /// Every listable resource at every served version.
    ///
    /// Only a failure to enumerate the API groups is an error; a group version
    /// that cannot be queried is left out.
    async fn discover(&self) -> kube::Result<Vec<ApiResource>>;

    /// List objects of `resource` across all namespaces.
    async fn list_objects(
        &self,
        resource: &ApiResource,
        params: &ListParams,
    ) -> kube::Result<Vec<DynamicObject>>;

    /// List pods in `namespace`, or in every namespace when `None`.
    async fn list_pods(&self, namespace: Option<&str>, params: &ListParams)
    -> kube::Result<Vec<Pod>>;

    /// Stream a container log into `out`, returning the number of bytes copied.
    async fn copy_logs<W>(
        &self,
        namespace: &str,
        pod: &str,
        params: &LogParams,
        out: &mut W,
    ) -> Result<u64, LogCopyError>
    where
        W: AsyncWrite + Unpin;
}

/// [`Cluster`] backed by a live API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Cluster for KubeCluster {
    async fn discover(&self) -> kube::Result<Vec<ApiResource>> {
        let core = self.client.list_core_api_versions().await?;
        let groups = self.client.list_api_groups().await?;

        let mut group_versions: Vec<GroupVersion> = core
            .versions
            .iter()
            .map(|v| GroupVersion::gv("", v))
            .collect();
        for group in &groups.groups {
            for v in &group.versions {
                group_versions.push(GroupVersion::gv(&group.name, &v.version));
            }
        }

        let mut queried = Vec::with_capacity(group_versions.len());
        for gv in group_versions {
            let resources = discovery::pinned_group(&self.client, &gv)
                .await
                .map(|group| group.versioned_resources(&gv.version));
            queried.push((gv, resources));
        }

        let resources = listable_resources(queried);
        debug!(count = resources.len(), "Discovered listable resources");
        Ok(resources)
    }

    async fn list_objects(
        &self,
        resource: &ApiResource,
        params: &ListParams,
    ) -> kube::Result<Vec<DynamicObject>> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), resource);
        list_all(&api, params, &resource.plural).await
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> kube::Result<Vec<Pod>> {
        let api: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        list_all(&api, params, "pods").await
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
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let stream = api.log_stream(pod, params).await?;
        let copied = copy_stream(Box::pin(stream), out).await?;
        Ok(copied)
    }
}

/// Flatten per-version discovery results into the listable resources.
///
/// Group versions whose query failed are logged and skipped.
fn listable_resources(
    queried: Vec<(GroupVersion, kube::Result<Vec<(ApiResource, ApiCapabilities)>>)>,
) -> Vec<ApiResource> {
    let mut resources = Vec::new();
    for (gv, result) in queried {
        let versioned = match result {
            Ok(versioned) => versioned,
            Err(e) => {
                warn!(
                    group_version = %gv.api_version(),
                    error = %e,
                    "Skipping unavailable API group version"
                );
                continue;
            }
        };
        for (ar, caps) in versioned {
            // Skip subresources (e.g., pods/log, pods/exec)
            if ar.plural.contains('/') || !caps.supports_operation(verbs::LIST) {
                continue;
            }
            resources.push(ar);
        }
    }
    resources
}

/// Copy bytes from a futures reader into a tokio writer unchanged.
pub async fn copy_stream<R, W>(mut reader: R, out: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut copied = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).await?;
        copied += n as u64;
    }
    out.flush().await?;
    Ok(copied)
}

/// Follow continue tokens until the server has returned every page.
async fn list_all<K>(api: &Api<K>, base_params: &ListParams, what: &str) -> kube::Result<Vec<K>>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    let mut items = Vec::new();
    let mut continue_token: Option<String> = None;
    let mut page_count = 0u32;

    loop {
        let mut params = base_params.clone().limit(PAGE_SIZE);
        if let Some(ref token) = continue_token {
            params = params.continue_token(token);
        }

        let list: ObjectList<K> = api.list(&params).await?;
        items.extend(list.items);
        page_count += 1;

        match list.metadata.continue_ {
            Some(token) if !token.is_empty() => continue_token = Some(token),
            _ => break,
        }
    }

    debug!(
        what = %what,
        pages = page_count,
        total_items = items.len(),
        "List complete"
    );
    Ok(items)
}
