#![forbid(unsafe_code)]

use std::time::Duration;

use edusync_bridge::{BridgeConfig, CapabilityBridge, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SIGN_TTL};
use edusync_notify::FanoutConfig;
use url::Url;

mod client;

pub use client::{Client, NewAssignment, NewTask, OpError};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Bridge settings, absent when no bridge endpoint is configured.
    /// File upload/open operations are disabled in that case.
    pub bridge: Option<BridgeConfig>,
    pub fanout: FanoutConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_values(
            std::env::var("BRIDGE_ENDPOINT").ok(),
            std::env::var("BRIDGE_API_KEY").ok(),
            std::env::var("BRIDGE_TIMEOUT_SECS").ok(),
            std::env::var("BRIDGE_SIGN_TTL_SECS").ok(),
            std::env::var("FANOUT_TIMEOUT_SECS").ok(),
        )
    }

    fn from_values(
        bridge_endpoint: Option<String>,
        bridge_api_key: Option<String>,
        bridge_timeout_secs: Option<String>,
        bridge_sign_ttl_secs: Option<String>,
        fanout_timeout_secs: Option<String>,
    ) -> anyhow::Result<Self> {
        let bridge = match bridge_endpoint {
            Some(raw) => {
                let endpoint = validate_http_url(&raw, "bridge endpoint")?;
                Some(BridgeConfig {
                    endpoint,
                    api_key: bridge_api_key.filter(|key| !key.trim().is_empty()),
                    request_timeout: parse_secs(
                        bridge_timeout_secs,
                        "BRIDGE_TIMEOUT_SECS",
                        DEFAULT_REQUEST_TIMEOUT,
                    )?,
                    default_sign_ttl: parse_secs(
                        bridge_sign_ttl_secs,
                        "BRIDGE_SIGN_TTL_SECS",
                        DEFAULT_SIGN_TTL,
                    )?,
                })
            }
            None => None,
        };

        let fanout = FanoutConfig {
            commit_timeout: parse_secs(
                fanout_timeout_secs,
                "FANOUT_TIMEOUT_SECS",
                FanoutConfig::default().commit_timeout,
            )?,
        };

        Ok(Self { bridge, fanout })
    }

    #[must_use]
    pub fn build_bridge(&self) -> Option<CapabilityBridge> {
        self.bridge.clone().map(CapabilityBridge::new)
    }
}

fn parse_secs(
    value: Option<String>,
    name: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid {name} {raw:?}: expected whole seconds"))?;
            Ok(Duration::from_secs(secs))
        }
    }
}

fn validate_http_url(raw: &str, label: &str) -> anyhow::Result<Url> {
    let parsed =
        Url::parse(raw).map_err(|error| anyhow::anyhow!("invalid {label} URL {raw:?}: {error}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow::anyhow!(
            "invalid {label} URL {raw:?}: must use http or https"
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::AppConfig;

    #[test]
    fn from_values_defaults_to_no_bridge() {
        let config = AppConfig::from_values(None, None, None, None, None).expect("parse config");
        assert!(config.bridge.is_none());
        assert_eq!(config.fanout.commit_timeout, Duration::from_secs(10));
    }

    #[test]
    fn from_values_parses_bridge_settings() {
        let config = AppConfig::from_values(
            Some("https://bridge.example/functions/v1/storage".to_owned()),
            Some("anon-key".to_owned()),
            Some("15".to_owned()),
            Some("300".to_owned()),
            None,
        )
        .expect("parse config");

        let bridge = config.bridge.expect("bridge config");
        assert_eq!(
            bridge.endpoint.as_str(),
            "https://bridge.example/functions/v1/storage"
        );
        assert_eq!(bridge.api_key.as_deref(), Some("anon-key"));
        assert_eq!(bridge.request_timeout, Duration::from_secs(15));
        assert_eq!(bridge.default_sign_ttl, Duration::from_secs(300));
    }

    #[test]
    fn from_values_rejects_invalid_endpoint_urls() {
        let error = AppConfig::from_values(Some("not-a-url".to_owned()), None, None, None, None)
            .expect_err("invalid URL should fail");
        assert!(error.to_string().contains("invalid bridge endpoint URL"));
    }

    #[test]
    fn from_values_rejects_non_http_schemes() {
        let error =
            AppConfig::from_values(Some("ftp://bridge.example".to_owned()), None, None, None, None)
                .expect_err("non-http scheme should fail");
        assert!(error.to_string().contains("must use http or https"));
    }

    #[test]
    fn from_values_rejects_non_numeric_timeouts() {
        let error = AppConfig::from_values(
            Some("https://bridge.example".to_owned()),
            None,
            Some("soon".to_owned()),
            None,
            None,
        )
        .expect_err("invalid timeout should fail");
        assert!(error.to_string().contains("BRIDGE_TIMEOUT_SECS"));
    }

    #[test]
    fn blank_api_keys_are_dropped() {
        let config = AppConfig::from_values(
            Some("https://bridge.example".to_owned()),
            Some("  ".to_owned()),
            None,
            None,
            None,
        )
        .expect("parse config");
        assert!(config.bridge.expect("bridge config").api_key.is_none());
    }

    #[test]
    fn fanout_timeout_is_configurable() {
        let config = AppConfig::from_values(None, None, None, None, Some("3".to_owned()))
            .expect("parse config");
        assert_eq!(config.fanout.commit_timeout, Duration::from_secs(3));
    }
}
