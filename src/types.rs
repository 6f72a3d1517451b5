use serde::{Deserialize, Serialize};

/// Instructions for one snapshot run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Object kinds to dump
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,

    /// Pods whose logs should be captured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<Log>,
}

impl Configuration {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.logs.is_empty()
    }
}

/// One object kind to snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// API group, empty for the core group
    #[serde(default)]
    pub group: String,

    pub version: String,

    pub kind: String,

    /// Empty means every namespace (and cluster-scoped objects)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_filters: Vec<LabelFilter>,
}

/// One pod log capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_filters: Vec<LabelFilter>,

    /// Only return lines emitted in the last N seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFilter {
    pub key: String,
    pub operation: Operation,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Equal,
    #[serde(alias = "Different")]
    NotEqual,
}

#[cfg(test)]
impl LabelFilter {
    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation: Operation::Equal,
            value: value.into(),
        }
    }

    pub fn not_equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation: Operation::NotEqual,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.version, self.kind)?;
        if !self.namespace.is_empty() {
            write!(f, " in {}", self.namespace)?;
        }
        if !self.label_filters.is_empty() {
            write!(f, " ({})", crate::selector::label_selector(&self.label_filters))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "logs in all namespaces")?;
        } else {
            write!(f, "logs in {}", self.namespace)?;
        }
        if !self.label_filters.is_empty() {
            write!(f, " ({})", crate::selector::label_selector(&self.label_filters))?;
        }
        Ok(())
    }
}
