use std::time::Duration;

use serde::Deserialize;

use crate::gateway::PacingConfig;

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(tag = "type")]
pub enum StoreConfig {
    #[default]
    Memory,
    Sqlite {
        url: String,
    },
    CloudflareKv {
        account_id: String,
        content_namespace: String,
        settings_namespace: String,
    },
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Prefix of every link written to `llms.txt`.
    #[serde(default)]
    pub base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            pacing: PacingConfig::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            base_path: String::new(),
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.pacing.validate()?;
        if self.base_path.ends_with('/') {
            return Err(format!(
                "base_path must not end with '/': {}",
                self.base_path
            ));
        }
        if let StoreConfig::CloudflareKv {
            content_namespace,
            settings_namespace,
            ..
        } = &self.store
        {
            if content_namespace.is_empty() || settings_namespace.is_empty() {
                return Err("Cloudflare KV namespaces must not be empty".to_owned());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_store() {
        let config: Config = serde_yaml::from_str(
            r#"
store:
  type: CloudflareKv
  account_id: acc
  content_namespace: content
  settings_namespace: settings
pacing:
  min_delay_ms: 200
base_path: /llms
"#,
        )
        .unwrap();
        assert_eq!(
            config.store,
            StoreConfig::CloudflareKv {
                account_id: "acc".into(),
                content_namespace: "content".into(),
                settings_namespace: "settings".into(),
            }
        );
        assert_eq!(config.pacing.min_delay_ms, 200);
        assert_eq!(config.pacing.max_delay_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_trailing_slash() {
        let config = Config {
            base_path: "/llms/".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
