use std::any::Any;
use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::OnceCell;

use crate::config::{roles, ConfigFactory, MakerConfig, MakerOptions, Resolver};
use crate::container::{Container, DefaultServiceProvider};
use crate::error::{Error, Result};
use crate::models::cdp::{Cdp, ProxyCdp};
use crate::rpc::Transport;
use crate::services::cdp::EthereumCdpService;
use crate::services::event::{Event, EventService};
use crate::services::proxy::DsProxyService;

/// Entry point: resolves a preset into a container of services and
/// exposes the common CDP operations on top of it.
///
/// ```no_run
/// # async fn run() -> maker_dai_rs::Result<()> {
/// use maker_dai_rs::{Maker, MakerOptions};
///
/// let maker = Maker::create("mainnet", MakerOptions::default()).await?;
/// let cdp = maker.get_cdp(614).await?;
/// println!("debt: {}", cdp.get_debt_value().await?);
/// # Ok(())
/// # }
/// ```
pub struct Maker {
    config: MakerConfig,
    container: Container,
    authenticated: OnceCell<()>,
}

impl Maker {
    pub async fn create(preset: &str, options: MakerOptions) -> Result<Maker> {
        let config = ConfigFactory::create(preset, options, &Resolver::default())?;
        Self::from_provider(DefaultServiceProvider::new(config)).await
    }

    /// Like [`Maker::create`], but talking to the node through `transport`.
    pub async fn with_transport(
        preset: &str,
        options: MakerOptions,
        transport: Arc<dyn Transport>,
    ) -> Result<Maker> {
        let config = ConfigFactory::create(preset, options, &Resolver::default())?;
        Self::from_provider(DefaultServiceProvider::new(config).with_transport(transport)).await
    }

    async fn from_provider(provider: DefaultServiceProvider) -> Result<Maker> {
        let container = provider.build_container()?;
        let maker = Maker {
            config: provider.config().clone(),
            container,
            authenticated: OnceCell::new(),
        };
        if maker.config.auto_authenticate {
            maker.authenticate().await?;
        }
        Ok(maker)
    }

    /// Bring every service up; later calls reuse the first successful run.
    pub async fn authenticate(&self) -> Result<()> {
        self.authenticated
            .get_or_try_init(|| async {
                tracing::info!(preset = ?self.config.preset, url = %self.config.url, "authenticating");
                self.container.authenticate().await
            })
            .await?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.initialized()
    }

    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn service<T: Any + Send + Sync>(&self, role: &str) -> Result<Arc<T>> {
        self.container.service::<T>(role)
    }

    pub fn on<F>(&self, event: &str, listener: F) -> Result<()>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.service::<EventService>(roles::EVENT)?.on(event, listener);
        Ok(())
    }

    fn cdp_service(&self) -> Result<Arc<EthereumCdpService>> {
        self.service::<EthereumCdpService>(roles::CDP)
    }

    pub async fn open_cdp(&self) -> Result<Cdp> {
        self.authenticate().await?;
        let service = self.cdp_service()?;
        let id = service.open_cdp().await?;
        Ok(Cdp::new(id, service))
    }

    /// Open a CDP owned by the account's DSProxy, building the proxy first if needed.
    pub async fn open_proxy_cdp(&self) -> Result<ProxyCdp> {
        self.authenticate().await?;
        let proxy = self.service::<DsProxyService>(roles::PROXY)?.ensure_proxy().await?;
        let service = self.cdp_service()?;
        let id = service.open_proxy_cdp(proxy).await?;
        Ok(ProxyCdp::new(id, proxy, service))
    }

    pub async fn get_cdp(&self, id: u64) -> Result<Cdp> {
        self.authenticate().await?;
        let service = self.cdp_service()?;
        Self::validate_cdp(&service, id).await?;
        Ok(Cdp::new(id, service))
    }

    pub async fn get_proxy_cdp(&self, id: u64, proxy: Address) -> Result<ProxyCdp> {
        self.authenticate().await?;
        let service = self.cdp_service()?;
        Self::validate_cdp(&service, id).await?;
        Ok(ProxyCdp::new(id, proxy, service))
    }

    async fn validate_cdp(service: &EthereumCdpService, id: u64) -> Result<()> {
        let info = service.get_info(id).await?;
        if !info.exists() {
            return Err(Error::CdpNotFound { id });
        }
        Ok(())
    }
}
