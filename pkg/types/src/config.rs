use serde::{Deserialize, Serialize};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// data-dir: /var/lib/appservice-controller
/// resync-interval-secs: 30
/// reconcile-timeout-secs: 10
/// backoff-base-ms: 200
/// backoff-max-secs: 60
/// log-level: info
/// log-format: json
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    /// Keep state in memory only; nothing survives a restart.
    #[serde(default, alias = "in-memory")]
    pub in_memory: Option<bool>,
    #[serde(default, alias = "resync-interval-secs")]
    pub resync_interval_secs: Option<u64>,
    #[serde(default, alias = "reconcile-timeout-secs")]
    pub reconcile_timeout_secs: Option<u64>,
    #[serde(default, alias = "backoff-base-ms")]
    pub backoff_base_ms: Option<u64>,
    #[serde(default, alias = "backoff-max-secs")]
    pub backoff_max_secs: Option<u64>,
    #[serde(default, alias = "log-level")]
    pub log_level: Option<String>,
    #[serde(default, alias = "log-format")]
    pub log_format: Option<LogFormat>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg: ControllerConfigFile =
            load_config_file("/nonexistent/appservice-controller.yaml").unwrap();
        assert!(cfg.data_dir.is_none());
        assert!(cfg.log_format.is_none());
    }

    #[test]
    fn parses_kebab_case_keys() {
        let yaml = r#"
data-dir: /var/lib/asc
resync-interval-secs: 5
backoff-base-ms: 50
log-format: json
in-memory: true
"#;
        let cfg: ControllerConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.data_dir.as_deref(), Some("/var/lib/asc"));
        assert_eq!(cfg.resync_interval_secs, Some(5));
        assert_eq!(cfg.backoff_base_ms, Some(50));
        assert_eq!(cfg.log_format, Some(LogFormat::Json));
        assert_eq!(cfg.in_memory, Some(true));
    }
}
