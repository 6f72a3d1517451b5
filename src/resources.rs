use kube::ResourceExt;
use kube::api::{DynamicObject, ListParams};
use kube::core::TypeMeta;
use kube::discovery::ApiResource;
use tracing::{debug, info, warn};

use crate::cluster::Cluster;
use crate::error::Error;
use crate::layout::Layout;
use crate::resolver::{Resolution, Resolver};
use crate::selector;
use crate::types::Resource;

/// What happened to one resource target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOutcome {
    /// Number of objects written
    Collected(usize),
    /// The kind is not served by this cluster
    Skipped,
}

pub async fn collect_resource<C: Cluster>(
    cluster: &C,
    resolver: &Resolver,
    layout: &Layout,
    resource: &Resource,
) -> Result<ResourceOutcome, Error> {
    let gvk = format!("{}:{}:{}", resource.group, resource.version, resource.kind);
    info!(gvk = %gvk, "Collecting resources");

    let ar = match resolver
        .resolve(cluster, &resource.group, &resource.version, &resource.kind)
        .await
    {
        Resolution::Found(ar) => ar,
        Resolution::NotFound => {
            info!(gvk = %gvk, "No endpoint serves this kind, skipping");
            return Ok(ResourceOutcome::Skipped);
        }
        Resolution::Failed(e) => return Err(e),
    };

    let params = list_params(resource)?;
    let objects = cluster
        .list_objects(&ar, &params)
        .await
        .map_err(|source| Error::List {
            what: ar.plural.clone(),
            source,
        })?;
    info!(gvk = %gvk, count = objects.len(), "Collected resources");

    let mut written = 0;
    for obj in objects {
        dump_object(layout, &ar, obj).await?;
        written += 1;
    }
    Ok(ResourceOutcome::Collected(written))
}

fn list_params(resource: &Resource) -> Result<ListParams, Error> {
    selector::validate(&resource.label_filters)?;

    let mut params = ListParams::default();
    let labels = selector::label_selector(&resource.label_filters);
    if !labels.is_empty() {
        params = params.labels(&labels);
    }
    if !resource.namespace.is_empty() {
        let fields =
            selector::namespace_field_selector(params.field_selector.as_deref(), &resource.namespace);
        params = params.fields(&fields);
    }
    Ok(params)
}

/// Normalize one object for storage and write it to its layout path.
async fn dump_object(layout: &Layout, ar: &ApiResource, mut obj: DynamicObject) -> Result<(), Error> {
    obj.metadata.resource_version = None;
    attach_type_meta(&mut obj, ar);

    let kind = obj
        .types
        .as_ref()
        .map(|t| t.kind.clone())
        .unwrap_or_else(|| ar.kind.clone());
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    if obj.metadata.deletion_timestamp.is_some() {
        warn!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            "Resource is marked for deletion, collecting it anyway"
        );
    }

    let yaml = serde_yaml::to_string(&obj).map_err(|source| Error::Serialize {
        name: format!("{}/{}", kind, name),
        source,
    })?;

    let path = layout.resource(&namespace, &kind, &name);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(Error::io(dir))?;
    }
    debug!(path = %path.display(), "Storing resource");
    tokio::fs::write(&path, yaml)
        .await
        .map_err(Error::io(&path))?;
    Ok(())
}

/// List responses leave per-item apiVersion/kind empty; restore them from the endpoint.
fn attach_type_meta(obj: &mut DynamicObject, ar: &ApiResource) {
    if ar.kind.is_empty() || ar.api_version.is_empty() {
        return;
    }
    obj.types = Some(TypeMeta {
        api_version: ar.api_version.clone(),
        kind: ar.kind.clone(),
    });
}
