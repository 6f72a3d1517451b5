use crate::error::Error;
use crate::types::{LabelFilter, Operation};

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Render label filters as a Kubernetes label selector.
///
/// Filters are ANDed with `,` in the order given. Keys and values are not escaped.
pub fn label_selector(filters: &[LabelFilter]) -> String {
    filters
        .iter()
        .map(|f| match f.operation {
            Operation::Equal => format!("{}={}", f.key, f.value),
            Operation::NotEqual => format!("{}!={}", f.key, f.value),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Conjoin `metadata.namespace=<ns>` onto an existing field selector.
pub fn namespace_field_selector(existing: Option<&str>, namespace: &str) -> String {
    match existing {
        Some(fields) if !fields.is_empty() => {
            format!("{},metadata.namespace={}", fields, namespace)
        }
        _ => format!("metadata.namespace={}", namespace),
    }
}

/// Check every filter against the label key/value syntax the API server enforces.
pub fn validate(filters: &[LabelFilter]) -> Result<(), Error> {
    for f in filters {
        let reason = validate_key(&f.key)
            .err()
            .or_else(|| validate_value(&f.value).err());
        if let Some(reason) = reason {
            return Err(Error::InvalidSelector {
                selector: label_selector(filters),
                reason,
            });
        }
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), String> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
                return Err(format!("invalid prefix in key {:?}", key));
            }
            if !prefix.split('.').all(is_dns_label) {
                return Err(format!("prefix of key {:?} is not a DNS subdomain", key));
            }
            name
        }
        None => key,
    };
    if name.is_empty() {
        return Err("empty label key".to_string());
    }
    check_name(name).map_err(|r| format!("key {:?} {}", key, r))
}

fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    check_name(value).map_err(|r| format!("value {:?} {}", value, r))
}

fn check_name(name: &str) -> Result<(), String> {
    if name.len() > MAX_NAME_LEN {
        return Err(format!("is longer than {} characters", MAX_NAME_LEN));
    }
    if !is_alnum_edged(name, &['-', '_', '.']) {
        return Err(
            "must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric"
                .to_string(),
        );
    }
    Ok(())
}

fn is_dns_label(part: &str) -> bool {
    is_alnum_edged(part, &['-']) && !part.chars().any(|c| c.is_ascii_uppercase())
}

fn is_alnum_edged(s: &str, extra: &[char]) -> bool {
    let edges_ok = s.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && s.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    edges_ok
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || extra.contains(&c))
}
