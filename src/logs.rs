use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube::api::{ListParams, LogParams};
use tracing::{debug, info};

use crate::cluster::{Cluster, LogCopyError};
use crate::error::Error;
use crate::layout::{Layout, LogsKind};
use crate::selector;
use crate::types::Log;

/// Capture logs for every container of every pod matching `log`.
///
/// Returns the number of log files written. The first failure stops the whole target.
pub async fn collect_logs<C: Cluster>(cluster: &C, layout: &Layout, log: &Log) -> Result<usize, Error> {
    selector::validate(&log.label_filters)?;

    let mut params = ListParams::default();
    let labels = selector::label_selector(&log.label_filters);
    if !labels.is_empty() {
        params = params.labels(&labels);
    }
    let namespace = (!log.namespace.is_empty()).then_some(log.namespace.as_str());

    let pods = cluster
        .list_pods(namespace, &params)
        .await
        .map_err(|source| Error::List {
            what: "pods".to_string(),
            source,
        })?;
    info!(
        namespace = namespace.unwrap_or("*"),
        count = pods.len(),
        "Found pods"
    );

    let mut written = 0;
    for pod in &pods {
        written += dump_pod_logs(cluster, layout, pod, log.since_seconds).await?;
    }
    Ok(written)
}

/// Collect every container's log, plus the previous incarnation of any container that restarted.
async fn dump_pod_logs<C: Cluster>(
    cluster: &C,
    layout: &Layout,
    pod: &Pod,
    since_seconds: Option<i64>,
) -> Result<usize, Error> {
    let Some(spec) = &pod.spec else {
        return Ok(0);
    };
    let namespace = pod.namespace().unwrap_or_default();
    let pod_name = pod.name_any();

    let mut written = 0;
    for container in &spec.containers {
        let target = LogTarget {
            namespace: &namespace,
            pod: &pod_name,
            container: &container.name,
            since_seconds,
        };
        target.collect(cluster, layout, LogsKind::Current).await?;
        written += 1;

        if restart_count(pod, &container.name) > 0 {
            target.collect(cluster, layout, LogsKind::Previous).await?;
            written += 1;
        }
    }
    Ok(written)
}

/// Restart count of the named container, zero when it has no status yet.
fn restart_count(pod: &Pod, container: &str) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.iter().find(|cs| cs.name == container))
        .map(|cs| cs.restart_count)
        .unwrap_or(0)
}

struct LogTarget<'a> {
    namespace: &'a str,
    pod: &'a str,
    container: &'a str,
    since_seconds: Option<i64>,
}

impl LogTarget<'_> {
    async fn collect<C: Cluster>(&self, cluster: &C, layout: &Layout, kind: LogsKind) -> Result<(), Error> {
        let path = layout.log(self.namespace, self.pod, self.container, kind);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(Error::io(dir))?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(Error::io(&path))?;

        let params = LogParams {
            container: Some(self.container.to_string()),
            previous: kind == LogsKind::Previous,
            since_seconds: self.since_seconds,
            ..Default::default()
        };

        let copied = cluster
            .copy_logs(self.namespace, self.pod, &params, &mut file)
            .await
            .map_err(|e| match e {
                LogCopyError::Api(source) => Error::LogStream {
                    namespace: self.namespace.to_string(),
                    pod: self.pod.to_string(),
                    container: self.container.to_string(),
                    source,
                },
                LogCopyError::Io(source) => Error::LogCopy {
                    path: path.clone(),
                    source,
                },
            })?;
        debug!(
            path = %path.display(),
            bytes = copied,
            previous = params.previous,
            "Stored container log"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fake::pod;

    #[test]
    fn test_restart_count_is_scoped_to_container() {
        let p = pod("default", "web-0", &[], &[("app", 0), ("sidecar", 3)]);
        assert_eq!(restart_count(&p, "app"), 0);
        assert_eq!(restart_count(&p, "sidecar"), 3);
        assert_eq!(restart_count(&p, "missing"), 0);
    }

    #[test]
    fn test_restart_count_without_status() {
        let mut p = pod("default", "web-0", &[], &[("app", 2)]);
        p.status = None;
        assert_eq!(restart_count(&p, "app"), 0);
    }
}
