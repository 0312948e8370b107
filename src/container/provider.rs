use std::sync::Arc;

use crate::config::{MakerConfig, ServiceDefinition};
use crate::container::{Container, Service};
use crate::error::{Error, Result};
use crate::exchanges::OasisDirectService;
use crate::rpc::{HttpTransport, Transport};
use crate::services::accounts::AccountsService;
use crate::services::cdp::EthereumCdpService;
use crate::services::event::EventService;
use crate::services::price::PriceService;
use crate::services::proxy::DsProxyService;
use crate::services::smart_contract::SmartContractService;
use crate::services::token::TokenService;
use crate::services::transaction::TransactionManager;
use crate::services::web3::Web3Service;

const IMPLEMENTATIONS: &[&str] = &[
    "EventService",
    "Web3Service",
    "AccountsService",
    "SmartContractService",
    "TransactionManager",
    "TokenService",
    "PriceService",
    "EthereumCdpService",
    "DsProxyService",
    "OasisDirectService",
];

/// Builds a [`Container`] from a resolved configuration.
pub struct DefaultServiceProvider {
    config: MakerConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl DefaultServiceProvider {
    pub fn new(config: MakerConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Use this transport instead of an HTTP client for the configured url.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn supports(implementation: &str) -> bool {
        IMPLEMENTATIONS.contains(&implementation)
    }

    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        match &self.transport {
            Some(transport) => Ok(Arc::clone(transport)),
            None => Ok(Arc::new(HttpTransport::new(&self.config.url, self.config.rpc.clone())?)),
        }
    }

    fn create(&self, definition: &ServiceDefinition, transport: &Arc<dyn Transport>) -> Result<Arc<dyn Service>> {
        let config = &self.config;
        let service: Arc<dyn Service> = match definition.implementation.as_str() {
            "EventService" => Arc::new(EventService::new()),
            "Web3Service" => Arc::new(Web3Service::new(Arc::clone(transport), config.network_id)),
            "AccountsService" => Arc::new(AccountsService::new(config.account)),
            "SmartContractService" => Arc::new(SmartContractService::new(
                config.addresses.clone(),
                config.addresses_file.clone(),
            )),
            "TransactionManager" => Arc::new(TransactionManager::new(config.transactions.clone())),
            "TokenService" => Arc::new(TokenService::new()),
            "PriceService" => Arc::new(PriceService::new()),
            "EthereumCdpService" => Arc::new(EthereumCdpService::new()),
            "DsProxyService" => Arc::new(DsProxyService::new()),
            "OasisDirectService" => Arc::new(OasisDirectService::new(definition.settings.clone())),
            other => {
                return Err(Error::UnknownImplementation {
                    role: definition.role.clone(),
                    implementation: other.to_string(),
                })
            }
        };

        let provides = service.manager().name();
        if provides != definition.role {
            return Err(Error::config(format!(
                "{} provides '{}', not '{}'",
                definition.implementation, provides, definition.role
            )));
        }
        Ok(service)
    }

    pub fn build_container(&self) -> Result<Container> {
        let transport = self.transport()?;
        let mut container = Container::new();
        for definition in &self.config.services {
            tracing::debug!(
                role = %definition.role,
                implementation = %definition.implementation,
                "registering service"
            );
            container.register(self.create(definition, &transport)?)?;
        }
        container.inject_dependencies()?;
        Ok(container)
    }
}
