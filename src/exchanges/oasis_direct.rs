use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde_json::Value;

use crate::abi::{MatchingMarket, OasisDirectProxy, ProxyCreationAndExecute};
use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::exchanges::ExchangeService;
use crate::models::currency::{parse_wad, Currency, CurrencyUnit};
use crate::models::receipt::Receipt;
use crate::services::addresses;
use crate::services::proxy::DsProxyService;
use crate::services::smart_contract::{Contract, SmartContractService};
use crate::services::token::{self, TokenService};
use crate::services::transaction::TxOptions;

pub const DEFAULT_SLIPPAGE: f64 = 0.02;
const BPS: u64 = 10_000;

pub const SELL_ALL_AMOUNT: &str = "sellAllAmount";
pub const BUY_ALL_AMOUNT: &str = "buyAllAmount";

/// Arguments of a `sellAllAmount*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellParams {
    pub otc: Address,
    pub pay_token: Address,
    /// `None` when selling ETH: the amount travels as the transaction value.
    pub pay_amount: Option<U256>,
    pub buy_token: Address,
    pub min_buy_amount: U256,
}

/// Arguments of a `buyAllAmount*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyParams {
    pub otc: Address,
    pub buy_token: Address,
    pub buy_amount: U256,
    pub pay_token: Address,
    pub max_pay_amount: U256,
}

fn unknown_method(method: &str) -> Error {
    Error::abi(format!("unknown OasisDirect method '{}'", method))
}

/// Calldata for a sell entry point. `factory` is only used by `createAnd…`.
pub fn encode_sell(method: &str, params: &SellParams, factory: Address) -> Result<Vec<u8>> {
    let pay_amount = || {
        params
            .pay_amount
            .ok_or_else(|| Error::abi(format!("{} needs a pay amount", method)))
    };
    let data = match method {
        "sellAllAmount" => OasisDirectProxy::sellAllAmountCall {
            otc: params.otc,
            pay_token: params.pay_token,
            pay_amt: pay_amount()?,
            buy_token: params.buy_token,
            min_buy_amt: params.min_buy_amount,
        }
        .abi_encode(),
        "sellAllAmountPayEth" => OasisDirectProxy::sellAllAmountPayEthCall {
            otc: params.otc,
            weth_token: params.pay_token,
            buy_token: params.buy_token,
            min_buy_amt: params.min_buy_amount,
        }
        .abi_encode(),
        "sellAllAmountBuyEth" => OasisDirectProxy::sellAllAmountBuyEthCall {
            otc: params.otc,
            pay_token: params.pay_token,
            pay_amt: pay_amount()?,
            weth_token: params.buy_token,
            min_buy_amt: params.min_buy_amount,
        }
        .abi_encode(),
        // The creation contract wraps into its own WETH.
        "createAndSellAllAmountPayEth" => ProxyCreationAndExecute::createAndSellAllAmountPayEthCall {
            factory,
            otc: params.otc,
            buy_token: params.buy_token,
            min_buy_amt: params.min_buy_amount,
        }
        .abi_encode(),
        _ => return Err(unknown_method(method)),
    };
    Ok(data)
}

/// Calldata for a buy entry point. Paying with ETH sends the limit as
/// value rather than as an argument.
pub fn encode_buy(method: &str, params: &BuyParams, factory: Address) -> Result<Vec<u8>> {
    let data = match method {
        "buyAllAmount" => OasisDirectProxy::buyAllAmountCall {
            otc: params.otc,
            buy_token: params.buy_token,
            buy_amt: params.buy_amount,
            pay_token: params.pay_token,
            max_pay_amt: params.max_pay_amount,
        }
        .abi_encode(),
        "buyAllAmountPayEth" => OasisDirectProxy::buyAllAmountPayEthCall {
            otc: params.otc,
            buy_token: params.buy_token,
            buy_amt: params.buy_amount,
            weth_token: params.pay_token,
        }
        .abi_encode(),
        "buyAllAmountBuyEth" => OasisDirectProxy::buyAllAmountBuyEthCall {
            otc: params.otc,
            weth_token: params.buy_token,
            weth_amt: params.buy_amount,
            pay_token: params.pay_token,
            max_pay_amt: params.max_pay_amount,
        }
        .abi_encode(),
        "createAndBuyAllAmountPayEth" => ProxyCreationAndExecute::createAndBuyAllAmountPayEthCall {
            factory,
            otc: params.otc,
            buy_token: params.buy_token,
            buy_amt: params.buy_amount,
        }
        .abi_encode(),
        _ => return Err(unknown_method(method)),
    };
    Ok(data)
}

/// `value * bps / 10_000`, failing instead of wrapping.
fn scale_bps(value: U256, bps: u64, operation: &str) -> Result<U256> {
    value
        .checked_mul(U256::from(bps))
        .map(|scaled| scaled / U256::from(BPS))
        .ok_or_else(|| Error::Overflow {
            operation: operation.to_string(),
        })
}

fn is_create(method: &str) -> bool {
    method.starts_with("create")
}

fn capitalize(method: &str) -> String {
    let mut chars = method.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn slippage_bps(manager: &ServiceManager) -> u64 {
    let slippage = manager
        .setting("slippage")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_SLIPPAGE);
    (slippage.clamp(0.0, 1.0) * BPS as f64).round() as u64
}

/// Transaction options for an OasisDirect call.
#[derive(Debug, Clone, PartialEq)]
pub struct OasisOptions {
    /// ETH attached to the call; only set when paying with ETH.
    pub value: Option<U256>,
    pub otc: Address,
    /// Execute through the user's DSProxy. False for `createAnd…` calls,
    /// which build the proxy in the same transaction.
    pub ds_proxy: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Quote {
    first: String,
    second: String,
    amount: U256,
    result: Currency,
}

impl Quote {
    fn matches(&self, first: &str, second: &str, amount: U256) -> bool {
        self.first == first && self.second == second && self.amount == amount
    }
}

/// Swaps through the OasisDirect proxy library against the OTC order book.
pub struct OasisDirectService {
    manager: ServiceManager,
    slippage_bps: u64,
    last_buy: Mutex<Option<Quote>>,
    last_pay: Mutex<Option<Quote>>,
}

impl OasisDirectService {
    pub fn new(settings: BTreeMap<String, Value>) -> Self {
        let manager = ServiceManager::new(roles::EXCHANGE)
            .dependency(roles::SMART_CONTRACT)
            .dependency(roles::TOKEN)
            .dependency(roles::PROXY)
            .settings(settings);
        let slippage_bps = slippage_bps(&manager);
        Self {
            manager,
            slippage_bps,
            last_buy: Mutex::new(None),
            last_pay: Mutex::new(None),
        }
    }

    pub fn slippage(&self) -> f64 {
        self.slippage_bps as f64 / BPS as f64
    }

    /// Pick the OasisDirect entry point for a trade. ETH is never traded
    /// directly: buying it unwraps WETH, paying with it wraps first, and
    /// an account without a proxy gets one created in the same call.
    pub fn set_method(sell_token: &str, buy_token: &str, method: &str, proxy: Option<Address>) -> String {
        if buy_token == token::ETH {
            format!("{}BuyEth", method)
        } else if sell_token == token::ETH && proxy.is_some() {
            format!("{}PayEth", method)
        } else if sell_token == token::ETH {
            format!("createAnd{}PayEth", capitalize(method))
        } else {
            method.to_string()
        }
    }

    fn contract(&self, name: &str) -> Result<Contract> {
        self.manager
            .get::<SmartContractService>(roles::SMART_CONTRACT)?
            .contract_by_name(name)
    }

    fn otc(&self) -> Result<Contract> {
        self.contract(addresses::MAKER_OTC)
    }

    fn tokens(&self) -> Result<Arc<TokenService>> {
        self.manager.get::<TokenService>(roles::TOKEN)
    }

    /// ERC-20 address for a symbol; ETH trades as WETH.
    pub fn token_address(&self, symbol: &str) -> Result<Address> {
        let symbol = if symbol == token::ETH { token::WETH } else { symbol };
        Ok(self.tokens()?.get_erc20(symbol)?.address())
    }

    fn unit(symbol: &str) -> Result<CurrencyUnit> {
        CurrencyUnit::from_symbol(symbol).ok_or_else(|| Error::UnknownToken {
            symbol: symbol.to_string(),
        })
    }

    /// Arguments for a `sellAllAmount*` call. Selling ETH drops the amount,
    /// which travels as the transaction value instead.
    pub fn build_params(
        &self,
        sell_token: &str,
        pay_token: &str,
        amount: &str,
        buy_token: &str,
        limit: U256,
    ) -> Result<SellParams> {
        let pay_amount = if sell_token == token::ETH {
            None
        } else {
            Some(parse_wad(amount)?)
        };
        Ok(SellParams {
            otc: self.otc()?.address(),
            pay_token: self.token_address(pay_token)?,
            pay_amount,
            buy_token: self.token_address(buy_token)?,
            min_buy_amount: limit,
        })
    }

    pub fn build_options(&self, value: U256, sell_token: &str, method: &str) -> Result<OasisOptions> {
        Ok(OasisOptions {
            value: (sell_token == token::ETH).then_some(value),
            otc: self.otc()?.address(),
            ds_proxy: !is_create(method),
        })
    }

    pub fn last_buy_amount(&self) -> Option<Currency> {
        let last = self.last_buy.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref().map(|quote| quote.result)
    }

    pub fn last_pay_amount(&self) -> Option<Currency> {
        let last = self.last_pay.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref().map(|quote| quote.result)
    }

    async fn quote_buy_amount(&self, buy_token: &str, pay_token: &str, pay_amount: &str) -> Result<Currency> {
        let amount = parse_wad(pay_amount)?;
        let call = MatchingMarket::getBuyAmountCall {
            buy_gem: self.token_address(buy_token)?,
            pay_gem: self.token_address(pay_token)?,
            pay_amt: amount,
        };
        let fill = self.otc()?.call(&call).await?.fill_amt;
        let result = Self::unit(buy_token)?.wei(fill);
        *self.last_buy.lock().unwrap_or_else(PoisonError::into_inner) = Some(Quote {
            first: buy_token.to_string(),
            second: pay_token.to_string(),
            amount,
            result,
        });
        Ok(result)
    }

    async fn quote_pay_amount(&self, pay_token: &str, buy_token: &str, buy_amount: &str) -> Result<Currency> {
        let amount = parse_wad(buy_amount)?;
        let call = MatchingMarket::getPayAmountCall {
            pay_gem: self.token_address(pay_token)?,
            buy_gem: self.token_address(buy_token)?,
            buy_amt: amount,
        };
        let fill = self.otc()?.call(&call).await?.fill_amt;
        let result = Self::unit(pay_token)?.wei(fill);
        *self.last_pay.lock().unwrap_or_else(PoisonError::into_inner) = Some(Quote {
            first: pay_token.to_string(),
            second: buy_token.to_string(),
            amount,
            result,
        });
        Ok(result)
    }

    fn cached(slot: &Mutex<Option<Quote>>, first: &str, second: &str, amount: U256) -> Option<Currency> {
        let last = slot.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref()
            .filter(|quote| quote.matches(first, second, amount))
            .map(|quote| quote.result)
    }

    /// Least `buy_token` accepted for `pay_amount`, after slippage.
    pub async fn min_buy_amount(&self, buy_token: &str, pay_token: &str, pay_amount: &str) -> Result<U256> {
        let amount = parse_wad(pay_amount)?;
        let quote = match Self::cached(&self.last_buy, buy_token, pay_token, amount) {
            Some(quote) => quote,
            None => self.quote_buy_amount(buy_token, pay_token, pay_amount).await?,
        };
        scale_bps(quote.wei(), BPS - self.slippage_bps, "min_buy_amount")
    }

    /// Most `pay_token` spent for `buy_amount`, after slippage.
    pub async fn max_pay_amount(&self, pay_token: &str, buy_token: &str, buy_amount: &str) -> Result<U256> {
        let amount = parse_wad(buy_amount)?;
        let quote = match Self::cached(&self.last_pay, pay_token, buy_token, amount) {
            Some(quote) => quote,
            None => self.quote_pay_amount(pay_token, buy_token, buy_amount).await?,
        };
        scale_bps(quote.wei(), BPS + self.slippage_bps, "max_pay_amount")
    }

    /// The account's proxy, building one unless the trade pays with ETH and
    /// can create it on the fly.
    async fn trade_proxy(&self, pay_token: &str) -> Result<Option<Address>> {
        let proxies = self.manager.get::<DsProxyService>(roles::PROXY)?;
        match proxies.current_proxy().await? {
            Some(proxy) => Ok(Some(proxy)),
            None if pay_token == token::ETH => Ok(None),
            None => proxies.build().await.map(Some),
        }
    }

    async fn approve_proxy(&self, pay_token: &str, proxy: Option<Address>) -> Result<()> {
        if pay_token == token::ETH {
            return Ok(());
        }
        if let Some(proxy) = proxy {
            self.tokens()?.require_allowance(pay_token, proxy).await?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        method: &str,
        data: Vec<u8>,
        options: OasisOptions,
        proxy: Option<Address>,
    ) -> Result<Receipt> {
        tracing::info!(method, "submitting OasisDirect trade");

        let (target, tx_options) = if options.ds_proxy {
            let proxy = proxy.ok_or_else(|| Error::config("trade requires a DSProxy"))?;
            let tx_options = TxOptions {
                value: options.value,
                ds_proxy: Some(proxy),
                ..TxOptions::default()
            };
            (self.contract(addresses::OASIS_PROXY)?, tx_options)
        } else {
            let tx_options = TxOptions {
                value: options.value,
                ..TxOptions::default()
            };
            (self.contract(addresses::PROXY_CREATION_AND_EXECUTE)?, tx_options)
        };

        let label = format!("{}.{}", target.name(), method);
        target
            .send_calldata(data, tx_options, &label)
            .await?
            .mined()
            .await
    }

    fn factory(&self) -> Result<Address> {
        Ok(self.contract(addresses::PROXY_REGISTRY)?.address())
    }
}

#[async_trait]
impl ExchangeService for OasisDirectService {
    fn identifier(&self) -> &str {
        "OasisDirect"
    }

    async fn get_buy_amount(&self, buy_token: &str, pay_token: &str, pay_amount: &str) -> Result<Currency> {
        self.quote_buy_amount(buy_token, pay_token, pay_amount).await
    }

    async fn get_pay_amount(&self, pay_token: &str, buy_token: &str, buy_amount: &str) -> Result<Currency> {
        self.quote_pay_amount(pay_token, buy_token, buy_amount).await
    }

    async fn sell(&self, sell_token: &str, buy_token: &str, amount: &str) -> Result<Receipt> {
        let proxy = self.trade_proxy(sell_token).await?;
        let method = Self::set_method(sell_token, buy_token, SELL_ALL_AMOUNT, proxy);
        let limit = self.min_buy_amount(buy_token, sell_token, amount).await?;
        self.approve_proxy(sell_token, proxy).await?;

        let params = self.build_params(sell_token, sell_token, amount, buy_token, limit)?;
        let data = encode_sell(&method, &params, self.factory()?)?;
        let options = self.build_options(parse_wad(amount)?, sell_token, &method)?;
        self.execute(&method, data, options, proxy).await
    }

    async fn buy(&self, buy_token: &str, pay_token: &str, amount: &str) -> Result<Receipt> {
        let proxy = self.trade_proxy(pay_token).await?;
        let method = Self::set_method(pay_token, buy_token, BUY_ALL_AMOUNT, proxy);
        let limit = self.max_pay_amount(pay_token, buy_token, amount).await?;
        self.approve_proxy(pay_token, proxy).await?;

        let params = BuyParams {
            otc: self.otc()?.address(),
            buy_token: self.token_address(buy_token)?,
            buy_amount: parse_wad(amount)?,
            pay_token: self.token_address(pay_token)?,
            max_pay_amount: limit,
        };
        let data = encode_buy(&method, &params, self.factory()?)?;
        let options = self.build_options(limit, pay_token, &method)?;
        self.execute(&method, data, options, proxy).await
    }
}

#[async_trait]
impl Service for OasisDirectService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}
