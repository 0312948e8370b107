//! # maker-dai-rs
//!
//! A client library for the single-collateral Dai system (Sai): open and
//! manage CDPs, read and poke price feeds, and trade through OasisDirect.
//!
//! Everything is built from a small dependency-injection container. Each
//! role (`web3`, `accounts`, `token`, `price`, `cdp`, ...) is filled by a
//! service that declares the roles it depends on; the container injects
//! them and brings services up dependencies-first through
//! `initialize → connect → authenticate`.
//!
//! ## Services
//!
//! | Role | Default implementation | Depends on |
//! |------|------------------------|------------|
//! | event | EventService | |
//! | web3 | Web3Service | |
//! | accounts | AccountsService | web3 |
//! | transactionManager | TransactionManager | web3, accounts, event |
//! | smartContract | SmartContractService | web3, transactionManager |
//! | token | TokenService | smartContract, web3, accounts, transactionManager |
//! | price | PriceService | smartContract |
//! | proxy | DsProxyService | smartContract, accounts |
//! | cdp | EthereumCdpService | smartContract, token, price |
//! | exchange (optional) | OasisDirectService | smartContract, token, proxy |
//!
//! ## Quick Start
//!
//! ```no_run
//! use maker_dai_rs::{CurrencyUnit, Maker, MakerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = MakerOptions {
//!         url: Some("http://127.0.0.1:8545".to_string()),
//!         ..MakerOptions::default()
//!     };
//!     let maker = Maker::create("mainnet", options).await?;
//!
//!     let cdp = maker.open_cdp().await?;
//!     cdp.lock_eth(&CurrencyUnit::Eth.parse("0.5")?).await?;
//!     cdp.draw_dai(&CurrencyUnit::Dai.parse("20")?).await?;
//!     println!("cdp {} ratio {:?}", cdp.id(), cdp.get_collateralization_ratio().await?);
//!
//!     Ok(())
//! }
//! ```

pub mod abi;
pub mod config;
pub mod container;
pub mod error;
pub mod exchanges;
pub mod maker;
pub mod migrations;
pub mod models;
pub mod rpc;
pub mod services;
pub mod utils;

pub use config::{roles, ConfigFactory, MakerConfig, MakerOptions, Preset, ServiceSetting};
pub use container::{Container, DefaultServiceProvider, Service, ServiceManager, ServiceState};
pub use error::{Error, Result};
pub use exchanges::{ExchangeService, OasisDirectService};
pub use maker::Maker;
pub use models::{Cdp, CdpInfo, Currency, CurrencyUnit, ProxyCdp, Receipt};
pub use rpc::{HttpTransport, Transport};
