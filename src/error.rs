use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::Report;

/// Failure of a single collection target.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid label selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("discovery failed")]
    Discovery(#[source] kube::Error),

    #[error("failed to list {what}")]
    List {
        what: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to stream logs for {namespace}/{pod}/{container}")]
    LogStream {
        namespace: String,
        pod: String,
        container: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to copy log stream into {}", .path.display())]
    LogCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {name}")]
    Serialize {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}

/// Displays an error followed by each of its causes.
pub struct Chain<'a>(pub &'a (dyn std::error::Error + 'static));

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {}", cause)?;
            source = cause.source();
        }
        Ok(())
    }
}

/// Which declared target a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Resource(String),
    Log(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Resource(desc) => write!(f, "resource {}", desc),
            Target::Log(desc) => write!(f, "{}", desc),
        }
    }
}

#[derive(Debug)]
pub struct TargetFailure {
    pub target: Target,
    pub error: Error,
}

/// Every target that failed during one run, kept side by side.
#[derive(Debug)]
pub struct CollectionErrors {
    pub failures: Vec<TargetFailure>,
    pub report: Report,
}

impl fmt::Display for CollectionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} collection targets failed",
            self.failures.len(),
            self.report.attempted
        )?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.target, Chain(&failure.error))?;
        }
        Ok(())
    }
}

impl std::error::Error for CollectionErrors {}
