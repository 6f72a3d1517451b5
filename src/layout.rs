use std::path::{Path, PathBuf};

/// Where snapshot artifacts live under the output root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

/// Which incarnation of a container a log file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsKind {
    Current,
    Previous,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/resources/<namespace>/<kind>/<name>.yaml`
    ///
    /// Cluster-scoped objects have an empty namespace, which collapses out of the path.
    pub fn resource(&self, namespace: &str, kind: &str, name: &str) -> PathBuf {
        let mut p = self.root.join("resources");
        if !namespace.is_empty() {
            p.push(namespace);
        }
        p.push(kind);
        p.push(format!("{}.yaml", name));
        p
    }

    /// `<root>/logs/<namespace>/<pod>-<container>[.previous]`
    pub fn log(&self, namespace: &str, pod: &str, container: &str, kind: LogsKind) -> PathBuf {
        let mut p = self.root.join("logs");
        if !namespace.is_empty() {
            p.push(namespace);
        }
        let file_name = match kind {
            LogsKind::Current => format!("{}-{}", pod, container),
            LogsKind::Previous => format!("{}-{}.previous", pod, container),
        };
        p.push(file_name);
        p
    }
}
