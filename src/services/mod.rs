pub mod accounts;
pub mod addresses;
pub mod cdp;
pub mod event;
pub mod price;
pub mod proxy;
pub mod smart_contract;
pub mod token;
pub mod transaction;
pub mod web3;

pub use accounts::AccountsService;
pub use cdp::EthereumCdpService;
pub use event::EventService;
pub use price::PriceService;
pub use proxy::DsProxyService;
pub use smart_contract::{Contract, SmartContractService};
pub use token::{Token, TokenService};
pub use transaction::{TransactionManager, TransactionObject, TxOptions};
pub use web3::Web3Service;
