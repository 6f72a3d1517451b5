//! Maps (group, version, kind) onto listable API collections.
//!
//! Discovery is fetched once per session and never refreshed, so a kind
//! registered mid-run stays unknown until the next run.

use std::collections::HashMap;

use kube::discovery::ApiResource;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::cluster::Cluster;
use crate::error::Error;

/// Outcome of resolving a GVK against the discovery snapshot.
#[derive(Debug)]
pub enum Resolution {
    Found(ApiResource),
    /// The cluster does not serve this kind at this version
    NotFound,
    Failed(Error),
}

/// Listable resources indexed by (group, kind), one entry per served version.
#[derive(Debug, Default)]
struct Registry {
    by_group_kind: HashMap<(String, String), Vec<ApiResource>>,
}

impl Registry {
    fn from_resources(resources: Vec<ApiResource>) -> Self {
        let mut registry = Registry::default();
        for ar in resources {
            let versions = registry
                .by_group_kind
                .entry((ar.group.clone(), ar.kind.clone()))
                .or_default();
            if !versions.iter().any(|v| v.version == ar.version) {
                versions.push(ar);
            }
        }
        registry
    }

    fn get(&self, group: &str, version: &str, kind: &str) -> Option<&ApiResource> {
        self.by_group_kind
            .get(&(group.to_string(), kind.to_string()))?
            .iter()
            .find(|ar| ar.version == version)
    }
}

/// Caching endpoint resolver; one per session.
#[derive(Debug, Default)]
pub struct Resolver {
    registry: OnceCell<Registry>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch discovery now so a failure surfaces before any target runs.
    pub async fn prime<C: Cluster>(&self, cluster: &C) -> Result<(), Error> {
        self.registry(cluster).await.map(|_| ())
    }

    pub async fn resolve<C: Cluster>(
        &self,
        cluster: &C,
        group: &str,
        version: &str,
        kind: &str,
    ) -> Resolution {
        let registry = match self.registry(cluster).await {
            Ok(r) => r,
            Err(e) => return Resolution::Failed(e),
        };
        match registry.get(group, version, kind) {
            Some(ar) => {
                debug!(group, version, kind, plural = %ar.plural, "Resolved endpoint");
                Resolution::Found(ar.clone())
            }
            None => Resolution::NotFound,
        }
    }

    async fn registry<C: Cluster>(&self, cluster: &C) -> Result<&Registry, Error> {
        self.registry
            .get_or_try_init(|| async {
                let resources = cluster.discover().await.map_err(Error::Discovery)?;
                debug!(count = resources.len(), "Cached discovery snapshot");
                Ok::<_, Error>(Registry::from_resources(resources))
            })
            .await
    }
}
