pub mod cdp;
pub mod currency;
pub mod receipt;

pub use cdp::{Cdp, CdpInfo, ProxyCdp};
pub use currency::{Currency, CurrencyUnit};
pub use receipt::{Log, Receipt};
