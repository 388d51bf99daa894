use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use click_runtime::{ClickPolicy, ClickPolicyConfig, ConfigError, RECONCILE_INTERVAL};
use serde::{Deserialize, Serialize};

/// Host polling and settling budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostTimings {
    pub settle_delay_ms: u64,
    pub ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for HostTimings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 750,
            ready_timeout_ms: 30_000,
            poll_interval_ms: 100,
        }
    }
}

impl HostTimings {
    /// Wait after a list mutation; never shorter than one reconciliation
    /// interval.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms).max(RECONCILE_INTERVAL)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Everything the host needs: the injected policy plus request blocking and
/// timing options. Field names follow the JSON configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickManagerConfig {
    #[serde(flatten)]
    pub policy: ClickPolicyConfig,
    /// Abort requests to well-known ad hosts.
    pub block_common_ads: bool,
    /// Abort stylesheet, image, font and archive requests.
    pub optimize: bool,
    #[serde(flatten)]
    pub timings: HostTimings,
}

impl ClickManagerConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading click manager config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing click manager config {}", path.display()))?;
        Ok(config)
    }

    pub fn policy(&self) -> Result<ClickPolicy, ConfigError> {
        ClickPolicy::from_config(&self.policy)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use click_runtime::{EnforcementLevel, Mode};

    use super::*;

    #[test]
    fn loads_flat_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"{{
                "mode": "BLACKLIST",
                "blacklist": [".ad", "#popup"],
                "blockWindowClickListeners": 1,
                "blockCommonAds": true,
                "settleDelayMs": 900
            }}"##
        )
        .unwrap();

        let config = ClickManagerConfig::load(file.path()).unwrap();
        assert!(config.block_common_ads);
        assert!(!config.optimize);
        assert_eq!(config.timings.settle_delay(), Duration::from_millis(900));
        assert_eq!(config.timings.ready_timeout(), Duration::from_secs(30));

        let policy = config.policy().unwrap();
        assert_eq!(policy.mode(), Mode::Blacklist);
        assert_eq!(policy.enforcement_level(), EnforcementLevel::PropagationBlock);
        assert_eq!(policy.blacklist().len(), 2);
    }

    #[test]
    fn settle_delay_never_undercuts_the_reconcile_interval() {
        let timings = HostTimings {
            settle_delay_ms: 10,
            ..HostTimings::default()
        };
        assert_eq!(timings.settle_delay(), RECONCILE_INTERVAL);
        assert_eq!(HostTimings::default().settle_delay(), Duration::from_millis(750));
    }

    #[test]
    fn load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = ClickManagerConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        let err = ClickManagerConfig::load(&bad).unwrap_err();
        assert!(err.to_string().contains("parsing click manager config"));
    }

    #[test]
    fn invalid_policy_is_a_configuration_error() {
        let config: ClickManagerConfig =
            serde_json::from_str(r#"{ "enforcementLevel": 7 }"#).unwrap();
        assert_eq!(
            config.policy().unwrap_err(),
            ConfigError::InvalidEnforcementLevel(7)
        );
    }
}
