use std::path::PathBuf;

use kube::Client;
use tracing::{info, warn};

use crate::cluster::{Cluster, KubeCluster};
use crate::error::{Chain, CollectionErrors, Error, Target, TargetFailure};
use crate::layout::Layout;
use crate::logs::collect_logs;
use crate::resolver::Resolver;
use crate::resources::{ResourceOutcome, collect_resource};
use crate::types::Configuration;

/// Counters for one snapshot run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Targets attempted, failed or not
    pub attempted: usize,
    pub objects_written: usize,
    pub log_files_written: usize,
    /// Resource targets whose kind the cluster does not serve
    pub skipped: usize,
}

/// Long-lived handles for one snapshot run: the cluster, its discovery cache and the output layout.
pub struct Session<C> {
    cluster: C,
    resolver: Resolver,
    layout: Layout,
}

impl Session<KubeCluster> {
    /// Build a session against a live cluster and fetch discovery up front.
    ///
    /// Fails when discovery cannot be fetched; no target could run without it.
    pub async fn connect(client: Client, root: impl Into<PathBuf>) -> Result<Self, Error> {
        let session = Session::new(KubeCluster::new(client), root);
        session.resolver.prime(&session.cluster).await?;
        Ok(session)
    }
}

impl<C: Cluster> Session<C> {
    pub fn new(cluster: C, root: impl Into<PathBuf>) -> Self {
        Self {
            cluster,
            resolver: Resolver::new(),
            layout: Layout::new(root),
        }
    }

    #[cfg(test)]
    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Attempt every target in `configuration` once, resources first, then logs.
    ///
    /// A failing target is recorded and the run moves on; all failures come back together.
    pub async fn run(&self, configuration: Option<&Configuration>) -> Result<Report, CollectionErrors> {
        let mut report = Report::default();
        let Some(configuration) = configuration.filter(|c| !c.is_empty()) else {
            info!("No configuration present, nothing to collect");
            return Ok(report);
        };

        info!(
            root = %self.layout.root().display(),
            resources = configuration.resources.len(),
            logs = configuration.logs.len(),
            "Starting snapshot"
        );

        let mut failures = Vec::new();

        for resource in &configuration.resources {
            report.attempted += 1;
            match collect_resource(&self.cluster, &self.resolver, &self.layout, resource).await {
                Ok(ResourceOutcome::Collected(n)) => report.objects_written += n,
                Ok(ResourceOutcome::Skipped) => report.skipped += 1,
                Err(error) => {
                    warn!(resource = %resource, error = %Chain(&error), "Failed to dump resources");
                    failures.push(TargetFailure {
                        target: Target::Resource(resource.to_string()),
                        error,
                    });
                }
            }
        }

        for log in &configuration.logs {
            report.attempted += 1;
            match collect_logs(&self.cluster, &self.layout, log).await {
                Ok(n) => report.log_files_written += n,
                Err(error) => {
                    warn!(log = %log, error = %Chain(&error), "Failed to collect logs");
                    failures.push(TargetFailure {
                        target: Target::Log(log.to_string()),
                        error,
                    });
                }
            }
        }

        info!(
            attempted = report.attempted,
            failed = failures.len(),
            objects = report.objects_written,
            log_files = report.log_files_written,
            skipped = report.skipped,
            "Snapshot finished"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(CollectionErrors { failures, report })
        }
    }
}
