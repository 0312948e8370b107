//! Presets, user options and the role → implementation resolver.
//!
//! Options can be built in code or read from TOML:
//!
//! ```toml
//! url = "http://127.0.0.1:2000"
//! account = "0x16fb96a5fa0427af0c8f7cf1eb4870231c8154b6"
//!
//! [services]
//! exchange = "OasisDirectService"
//!
//! [services.price]
//! implementation = "PriceService"
//!
//! [addresses]
//! SAI_TUB = "0x448a5065aebb8e423f0896e6c5d525c040f59af3"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::rpc::RpcSettings;

pub mod roles {
    pub const EVENT: &str = "event";
    pub const WEB3: &str = "web3";
    pub const ACCOUNTS: &str = "accounts";
    pub const SMART_CONTRACT: &str = "smartContract";
    pub const TRANSACTION_MANAGER: &str = "transactionManager";
    pub const TOKEN: &str = "token";
    pub const PRICE: &str = "price";
    pub const CDP: &str = "cdp";
    pub const PROXY: &str = "proxy";
    pub const EXCHANGE: &str = "exchange";
}

const TEST_URL: &str = "http://127.0.0.1:2000";
const LOCAL_URL: &str = "http://127.0.0.1:8545";
pub const MAINNET_NETWORK_ID: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Test,
    Http,
    Mainnet,
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "test" => Ok(Preset::Test),
            "http" => Ok(Preset::Http),
            "mainnet" => Ok(Preset::Mainnet),
            other => Err(Error::config(format!("unknown preset '{}'", other))),
        }
    }
}

impl Preset {
    fn default_url(&self) -> Option<&'static str> {
        match self {
            Preset::Test => Some(TEST_URL),
            Preset::Http => None,
            Preset::Mainnet => Some(LOCAL_URL),
        }
    }

    pub fn network_id(&self) -> Option<u64> {
        match self {
            Preset::Mainnet => Some(MAINNET_NETWORK_ID),
            Preset::Test | Preset::Http => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceTable {
    pub implementation: Option<String>,
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

/// How a role is configured: `true`/`false`, an implementation name, or a table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceSetting {
    Enabled(bool),
    Implementation(String),
    Configured(ServiceTable),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSettings {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_polls: 240,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MakerOptions {
    pub url: Option<String>,
    pub account: Option<Address>,
    pub auto_authenticate: bool,
    pub services: BTreeMap<String, ServiceSetting>,
    pub addresses: BTreeMap<String, Address>,
    pub addresses_file: Option<PathBuf>,
    pub transactions: TransactionSettings,
    pub rpc: RpcSettings,
}

impl Default for MakerOptions {
    fn default() -> Self {
        Self {
            url: None,
            account: None,
            auto_authenticate: true,
            services: BTreeMap::new(),
            addresses: BTreeMap::new(),
            addresses_file: None,
            transactions: TransactionSettings::default(),
            rpc: RpcSettings::default(),
        }
    }
}

impl MakerOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read options file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_service(mut self, role: &str, setting: ServiceSetting) -> Self {
        self.services.insert(role.to_string(), setting);
        self
    }

    pub fn with_address(mut self, name: &str, address: Address) -> Self {
        self.addresses.insert(name.to_string(), address);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub role: String,
    pub implementation: String,
    pub settings: BTreeMap<String, Value>,
}

/// Default implementation for every role the library knows about.
#[derive(Debug, Clone)]
pub struct Resolver {
    defaults: BTreeMap<String, String>,
    optional: Vec<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        let defaults = [
            (roles::EVENT, "EventService"),
            (roles::WEB3, "Web3Service"),
            (roles::ACCOUNTS, "AccountsService"),
            (roles::SMART_CONTRACT, "SmartContractService"),
            (roles::TRANSACTION_MANAGER, "TransactionManager"),
            (roles::TOKEN, "TokenService"),
            (roles::PRICE, "PriceService"),
            (roles::CDP, "EthereumCdpService"),
            (roles::PROXY, "DsProxyService"),
            (roles::EXCHANGE, "OasisDirectService"),
        ]
        .into_iter()
        .map(|(role, implementation)| (role.to_string(), implementation.to_string()))
        .collect();

        Self {
            defaults,
            optional: vec![roles::EXCHANGE.to_string()],
        }
    }
}

impl Resolver {
    pub fn default_implementation(&self, role: &str) -> Option<&str> {
        self.defaults.get(role).map(String::as_str)
    }

    fn definition(&self, role: &str, setting: Option<&ServiceSetting>) -> Result<Option<ServiceDefinition>> {
        let default = self.default_implementation(role);
        let missing_default = || Error::config(format!("no default implementation for role '{}'", role));

        let (implementation, settings) = match setting {
            None if self.optional.iter().any(|r| r == role) => return Ok(None),
            None | Some(ServiceSetting::Enabled(true)) => {
                (default.ok_or_else(missing_default)?.to_string(), BTreeMap::new())
            }
            Some(ServiceSetting::Enabled(false)) => return Ok(None),
            Some(ServiceSetting::Implementation(name)) => (name.clone(), BTreeMap::new()),
            Some(ServiceSetting::Configured(table)) => {
                let implementation = match &table.implementation {
                    Some(name) => name.clone(),
                    None => default.ok_or_else(missing_default)?.to_string(),
                };
                (implementation, table.settings.clone())
            }
        };

        Ok(Some(ServiceDefinition {
            role: role.to_string(),
            implementation,
            settings,
        }))
    }

    /// Turn user settings into the list of services to build, known roles first.
    pub fn resolve(&self, services: &BTreeMap<String, ServiceSetting>) -> Result<Vec<ServiceDefinition>> {
        let mut definitions = Vec::new();
        for role in self.defaults.keys() {
            if let Some(definition) = self.definition(role, services.get(role))? {
                definitions.push(definition);
            }
        }
        for (role, setting) in services {
            if self.defaults.contains_key(role) {
                continue;
            }
            if let Some(definition) = self.definition(role, Some(setting))? {
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }
}

#[derive(Debug, Clone)]
pub struct MakerConfig {
    pub preset: Preset,
    pub url: String,
    pub network_id: Option<u64>,
    pub account: Option<Address>,
    pub auto_authenticate: bool,
    pub services: Vec<ServiceDefinition>,
    pub addresses: BTreeMap<String, Address>,
    pub addresses_file: Option<PathBuf>,
    pub transactions: TransactionSettings,
    pub rpc: RpcSettings,
}

impl MakerConfig {
    pub fn service(&self, role: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.role == role)
    }
}

pub struct ConfigFactory;

impl ConfigFactory {
    pub fn create(preset: &str, options: MakerOptions, resolver: &Resolver) -> Result<MakerConfig> {
        let preset: Preset = preset.parse()?;
        let url = match (&options.url, preset.default_url()) {
            (Some(url), _) => url.clone(),
            (None, Some(url)) => url.to_string(),
            (None, None) => {
                return Err(Error::config("the http preset requires a url"));
            }
        };
        let services = resolver.resolve(&options.services)?;

        Ok(MakerConfig {
            preset,
            url,
            network_id: preset.network_id(),
            account: options.account,
            auto_authenticate: options.auto_authenticate,
            services,
            addresses: options.addresses,
            addresses_file: options.addresses_file,
            transactions: options.transactions,
            rpc: options.rpc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = ConfigFactory::create("test", MakerOptions::default(), &Resolver::default()).unwrap();
        assert_eq!(config.preset, Preset::Test);
        assert_eq!(config.url, TEST_URL);
        assert_eq!(config.network_id, None);
        assert!(config.auto_authenticate);

        let mainnet = ConfigFactory::create("mainnet", MakerOptions::default(), &Resolver::default()).unwrap();
        assert_eq!(mainnet.network_id, Some(1));

        assert!(ConfigFactory::create("http", MakerOptions::default(), &Resolver::default()).is_err());
        assert!(ConfigFactory::create("ropsten", MakerOptions::default(), &Resolver::default()).is_err());

        let options = MakerOptions {
            url: Some("http://node:8545".to_string()),
            ..MakerOptions::default()
        };
        let http = ConfigFactory::create("http", options, &Resolver::default()).unwrap();
        assert_eq!(http.url, "http://node:8545");
    }

    #[test]
    fn test_default_services_skip_exchange() {
        let config = ConfigFactory::create("test", MakerOptions::default(), &Resolver::default()).unwrap();
        assert!(config.service(roles::EXCHANGE).is_none());
        assert_eq!(config.service(roles::CDP).unwrap().implementation, "EthereumCdpService");
        assert_eq!(config.services.len(), 9);
    }

    #[test]
    fn test_service_settings() {
        let options = MakerOptions::default()
            .with_service(roles::EXCHANGE, ServiceSetting::Implementation("OasisDirectService".into()))
            .with_service(roles::PRICE, ServiceSetting::Enabled(false));
        let config = ConfigFactory::create("test", options, &Resolver::default()).unwrap();
        assert_eq!(config.service(roles::EXCHANGE).unwrap().implementation, "OasisDirectService");
        assert!(config.service(roles::PRICE).is_none());
    }

    #[test]
    fn test_unknown_role_needs_implementation() {
        let options = MakerOptions::default().with_service("gas", ServiceSetting::Enabled(true));
        assert!(ConfigFactory::create("test", options, &Resolver::default()).is_err());
    }

    #[test]
    fn test_options_from_toml() {
        let options = MakerOptions::from_toml_str(
            r#"
            url = "http://127.0.0.1:2000"
            account = "0x16fb96a5fa0427af0c8f7cf1eb4870231c8154b6"
            auto_authenticate = false

            [services]
            exchange = "OasisDirectService"
            proxy = true

            [services.cdp]
            implementation = "EthereumCdpService"
            confirmations = 2

            [addresses]
            SAI_TUB = "0x448a5065aebb8e423f0896e6c5d525c040f59af3"

            [transactions]
            max_polls = 10
            "#,
        )
        .unwrap();

        assert!(!options.auto_authenticate);
        assert_eq!(options.transactions.max_polls, 10);
        assert_eq!(options.transactions.poll_interval_ms, 500);
        assert_eq!(
            options.services.get("exchange"),
            Some(&ServiceSetting::Implementation("OasisDirectService".into()))
        );
        assert_eq!(options.services.get("proxy"), Some(&ServiceSetting::Enabled(true)));
        match options.services.get("cdp") {
            Some(ServiceSetting::Configured(table)) => {
                assert_eq!(table.implementation.as_deref(), Some("EthereumCdpService"));
                assert_eq!(table.settings.get("confirmations"), Some(&serde_json::json!(2)));
            }
            other => panic!("unexpected cdp setting {:?}", other),
        }
        assert!(options.addresses.contains_key("SAI_TUB"));
    }

    #[test]
    fn test_options_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url = \"http://127.0.0.1:8545\"\n[rpc]\nretries = 0").unwrap();
        let options = MakerOptions::from_file(file.path()).unwrap();
        assert_eq!(options.url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(options.rpc.retries, 0);
        assert_eq!(options.rpc.timeout_secs, 60);

        assert!(matches!(
            MakerOptions::from_file("/nonexistent/maker.toml"),
            Err(Error::Config { .. })
        ));
    }
}
