use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";
pub const MAINNET_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
pub const TESTNET_WS_URL: &str = "wss://api.hyperliquid-testnet.xyz/ws";

/// Requests admitted per rolling minute when nothing else is configured.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Everything a client needs, built once and handed to the builder.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub private_key: Option<Secret<String>>,
    pub wallet_address: Option<String>,
    pub vault_address: Option<String>,
    pub testnet: bool,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub requests_per_minute: u32,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 7)?;
        state.serialize_field(
            "private_key",
            &self.private_key.as_ref().map(|_| "[REDACTED]"),
        )?;
        state.serialize_field("wallet_address", &self.wallet_address)?;
        state.serialize_field("vault_address", &self.vault_address)?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("ws_url", &self.ws_url)?;
        state.serialize_field("requests_per_minute", &self.requests_per_minute)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            private_key: Option<String>,
            wallet_address: Option<String>,
            vault_address: Option<String>,
            #[serde(default)]
            testnet: bool,
            base_url: Option<String>,
            ws_url: Option<String>,
            requests_per_minute: Option<u32>,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            private_key: helper.private_key.map(Secret::new),
            wallet_address: helper.wallet_address,
            vault_address: helper.vault_address,
            testnet: helper.testnet,
            base_url: helper.base_url,
            ws_url: helper.ws_url,
            requests_per_minute: helper
                .requests_per_minute
                .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
        })
    }
}

impl ExchangeConfig {
    /// Create a configuration that can sign with the given hex private key
    #[must_use]
    pub fn new(private_key: String) -> Self {
        Self {
            private_key: Some(Secret::new(private_key)),
            ..Self::read_only()
        }
    }

    /// Create configuration for read-only operations (no signing key)
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            private_key: None,
            wallet_address: None,
            vault_address: None,
            testnet: false,
            base_url: None,
            ws_url: None,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - `{PREFIX}_PRIVATE_KEY`
    /// - `{PREFIX}_WALLET_ADDRESS`
    /// - `{PREFIX}_VAULT_ADDRESS`
    /// - `{PREFIX}_TESTNET` (defaults to false)
    /// - `{PREFIX}_BASE_URL`, `{PREFIX}_WS_URL`
    /// - `{PREFIX}_REQUESTS_PER_MINUTE` (defaults to 60)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let var = |name: &str| env::var(format!("{}_{}", prefix.to_uppercase(), name)).ok();

        let testnet = match var("TESTNET") {
            Some(raw) => raw.parse::<bool>().map_err(|_| {
                ConfigError::InvalidConfiguration(format!("{}_TESTNET must be true or false", prefix))
            })?,
            None => false,
        };

        let requests_per_minute = match var("REQUESTS_PER_MINUTE") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ConfigError::InvalidConfiguration(format!(
                    "{}_REQUESTS_PER_MINUTE must be a positive integer",
                    prefix
                ))
            })?,
            None => DEFAULT_REQUESTS_PER_MINUTE,
        };

        let config = Self {
            private_key: var("PRIVATE_KEY")
                .filter(|key| !key.is_empty())
                .map(Secret::new),
            wallet_address: var("WALLET_ADDRESS"),
            vault_address: var("VAULT_ADDRESS"),
            testnet,
            base_url: var("BASE_URL"),
            ws_url: var("WS_URL"),
            requests_per_minute,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no file, fall back to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Reject values the clients could not work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests_per_minute == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "requests_per_minute must be greater than zero".to_string(),
            ));
        }
        for (name, address) in [
            ("wallet_address", &self.wallet_address),
            ("vault_address", &self.vault_address),
        ] {
            if let Some(address) = address {
                if !is_hex_address(address) {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "{} is not a 20-byte hex address: {}",
                        name, address
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check if this configuration can sign actions
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.private_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
    }

    #[must_use]
    pub const fn is_mainnet(&self) -> bool {
        !self.testnet
    }

    /// Set testnet mode
    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    #[must_use]
    pub fn wallet_address(mut self, wallet_address: String) -> Self {
        self.wallet_address = Some(wallet_address);
        self
    }

    #[must_use]
    pub fn vault_address(mut self, vault_address: String) -> Self {
        self.vault_address = Some(vault_address);
        self
    }

    /// Set custom REST base URL
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set custom stream URL
    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    #[must_use]
    pub const fn requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    pub fn rest_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(if self.testnet {
            TESTNET_API_URL
        } else {
            MAINNET_API_URL
        })
    }

    pub fn stream_url(&self) -> &str {
        self.ws_url.as_deref().unwrap_or(if self.testnet {
            TESTNET_WS_URL
        } else {
            MAINNET_WS_URL
        })
    }

    /// Get private key (use carefully - exposes secret)
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_ref().map(|key| key.expose_secret().as_str())
    }
}

fn is_hex_address(address: &str) -> bool {
    let digits = address.strip_prefix("0x").unwrap_or(address);
    digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_redacts_private_key() {
        let config = ExchangeConfig::new("0xdeadbeef".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("deadbeef"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ExchangeConfig =
            serde_json::from_str(r#"{"private_key":"0x01","testnet":true}"#).unwrap();
        assert!(config.has_credentials());
        assert!(!config.is_mainnet());
        assert_eq!(config.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
        assert_eq!(config.rest_url(), TESTNET_API_URL);
        assert_eq!(config.stream_url(), TESTNET_WS_URL);
    }

    #[test]
    fn test_url_overrides_win_over_network() {
        let config = ExchangeConfig::read_only()
            .testnet(true)
            .base_url("http://127.0.0.1:8080".to_string())
            .ws_url("ws://127.0.0.1:8081".to_string());
        assert_eq!(config.rest_url(), "http://127.0.0.1:8080");
        assert_eq!(config.stream_url(), "ws://127.0.0.1:8081");
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ExchangeConfig::read_only()
            .requests_per_minute(0)
            .validate()
            .is_err());
        assert!(ExchangeConfig::read_only()
            .vault_address("0x1234".to_string())
            .validate()
            .is_err());
        assert!(ExchangeConfig::read_only()
            .vault_address("0x1234567890123456789012345678901234567890".to_string())
            .validate()
            .is_ok());
    }

    #[test]
    fn test_from_env_reads_prefixed_variables() {
        env::set_var("HLCFGTEST_PRIVATE_KEY", "0xabc");
        env::set_var("HLCFGTEST_TESTNET", "true");
        env::set_var("HLCFGTEST_REQUESTS_PER_MINUTE", "120");
        let config = ExchangeConfig::from_env("hlcfgtest").unwrap();
        assert_eq!(config.private_key(), Some("0xabc"));
        assert!(config.testnet);
        assert_eq!(config.requests_per_minute, 120);

        env::set_var("HLCFGTEST_TESTNET", "maybe");
        assert!(ExchangeConfig::from_env("hlcfgtest").is_err());
    }
}
