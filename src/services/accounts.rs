use std::sync::{Arc, PoisonError, RwLock};

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::services::web3::Web3Service;

/// Tracks which node-managed account transactions are sent from.
pub struct AccountsService {
    manager: ServiceManager,
    configured: Option<Address>,
    current: RwLock<Option<Address>>,
}

impl AccountsService {
    pub fn new(configured: Option<Address>) -> Self {
        Self {
            manager: ServiceManager::new(roles::ACCOUNTS).dependency(roles::WEB3),
            configured,
            current: RwLock::new(None),
        }
    }

    pub fn current_address(&self) -> Result<Address> {
        let current = *self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.ok_or(Error::NoAccount)
    }

    pub fn set_account(&self, address: Address) {
        tracing::info!(%address, "switching account");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(address);
    }

    pub async fn list_accounts(&self) -> Result<Vec<Address>> {
        self.manager.get::<Web3Service>(roles::WEB3)?.accounts().await
    }
}

#[async_trait]
impl Service for AccountsService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }

    async fn authenticate(&self) -> Result<()> {
        let account = match self.configured {
            Some(address) => address,
            None => self
                .list_accounts()
                .await?
                .into_iter()
                .next()
                .ok_or(Error::NoAccount)?,
        };
        self.set_account(account);
        Ok(())
    }
}
