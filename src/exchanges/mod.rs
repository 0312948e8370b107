use async_trait::async_trait;

use crate::error::Result;
use crate::models::currency::Currency;
use crate::models::receipt::Receipt;

pub mod oasis_direct;

pub use oasis_direct::OasisDirectService;

/// A venue that can quote and execute token swaps for the current account.
///
/// Token arguments are symbols (`"ETH"`, `"DAI"`, `"WETH"`, `"MKR"`) and
/// amounts are decimal strings in the unit of the token they refer to.
#[async_trait]
pub trait ExchangeService: Send + Sync {
    fn identifier(&self) -> &str;

    /// How much `buy_token` selling `pay_amount` of `pay_token` would return.
    async fn get_buy_amount(&self, buy_token: &str, pay_token: &str, pay_amount: &str) -> Result<Currency>;

    /// How much `pay_token` buying `buy_amount` of `buy_token` would cost.
    async fn get_pay_amount(&self, pay_token: &str, buy_token: &str, buy_amount: &str) -> Result<Currency>;

    /// Sell all of `amount` of `sell_token`.
    async fn sell(&self, sell_token: &str, buy_token: &str, amount: &str) -> Result<Receipt>;

    /// Buy exactly `amount` of `buy_token`.
    async fn buy(&self, buy_token: &str, pay_token: &str, amount: &str) -> Result<Receipt>;
}
