use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use tracing::{debug, info};

use crate::types::Configuration;

/// Fetch the collector configuration from a ConfigMap.
///
/// Returns `Ok(None)` when no data key holds a valid configuration, so unrelated
/// keys may live in the same ConfigMap.
pub async fn load_configuration(
    client: &Client,
    namespace: &str,
    name: &str,
) -> anyhow::Result<Option<Configuration>> {
    info!(configmap = %format!("{}/{}", namespace, name), "Getting ConfigMap");

    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let config_map = api
        .get(name)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get ConfigMap {}/{}: {}", namespace, name, e))?;

    let data = config_map
        .data
        .ok_or_else(|| anyhow::anyhow!("ConfigMap {}/{} has no data", namespace, name))?;

    Ok(parse_configuration(&data))
}

/// Try each value as YAML, then as JSON; the first one that parses wins.
pub fn parse_configuration(data: &BTreeMap<String, String>) -> Option<Configuration> {
    for (key, content) in data {
        match serde_yaml::from_str::<Configuration>(content) {
            Ok(config) => return Some(config),
            Err(yaml_err) => match serde_json::from_str::<Configuration>(content) {
                Ok(config) => return Some(config),
                Err(json_err) => {
                    debug!(key = %key, content = %content, "Configuration candidate");
                    info!(
                        key = %key,
                        yaml_error = %yaml_err,
                        json_error = %json_err,
                        "ConfigMap key does not contain a valid configuration"
                    );
                }
            },
        }
    }
    None
}
