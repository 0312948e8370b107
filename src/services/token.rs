use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;

use crate::abi::{SaiTub, ERC20, WETH9};
use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::models::currency::{Currency, CurrencyUnit};
use crate::models::receipt::Receipt;
use crate::services::accounts::AccountsService;
use crate::services::addresses;
use crate::services::smart_contract::{Contract, SmartContractService};
use crate::services::transaction::{TransactionManager, TransactionObject, TxOptions};
use crate::services::web3::Web3Service;

pub const ETH: &str = "ETH";
pub const DAI: &str = "DAI";
pub const MKR: &str = "MKR";
pub const OLD_MKR: &str = "OLD_MKR";
pub const WETH: &str = "WETH";
pub const PETH: &str = "PETH";

const TOKENS: &[&str] = &[ETH, DAI, MKR, OLD_MKR, WETH, PETH];

fn contract_name(symbol: &str) -> Option<&'static str> {
    match symbol {
        DAI => Some(addresses::SAI),
        MKR => Some(addresses::MKR),
        OLD_MKR => Some(addresses::OLD_MKR),
        WETH => Some(addresses::SAI_GEM),
        PETH => Some(addresses::SAI_SKR),
        _ => None,
    }
}

#[derive(Clone)]
pub struct Erc20Token {
    unit: CurrencyUnit,
    contract: Contract,
    accounts: Arc<AccountsService>,
}

impl Erc20Token {
    pub fn symbol(&self) -> &'static str {
        self.unit.symbol()
    }

    pub fn unit(&self) -> CurrencyUnit {
        self.unit
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub async fn balance(&self) -> Result<Currency> {
        self.balance_of(self.accounts.current_address()?).await
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Currency> {
        let ret = self.contract.call(&ERC20::balanceOfCall { owner }).await?;
        Ok(self.unit.wei(ret.balance))
    }

    pub async fn total_supply(&self) -> Result<Currency> {
        let ret = self.contract.call(&ERC20::totalSupplyCall {}).await?;
        Ok(self.unit.wei(ret.supply))
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        let ret = self
            .contract
            .call(&ERC20::allowanceCall { owner, spender })
            .await?;
        Ok(ret.remaining)
    }

    pub async fn approve(&self, spender: Address, amount: &Currency) -> Result<TransactionObject> {
        amount.expect_unit(self.unit)?;
        self.approve_raw(spender, amount.wei()).await
    }

    pub async fn approve_unlimited(&self, spender: Address) -> Result<TransactionObject> {
        self.approve_raw(spender, U256::MAX).await
    }

    async fn approve_raw(&self, spender: Address, wei: U256) -> Result<TransactionObject> {
        self.contract
            .send(&ERC20::approveCall { spender, amount: wei }, TxOptions::default())
            .await
    }

    pub async fn transfer(&self, to: Address, amount: &Currency) -> Result<TransactionObject> {
        amount.expect_unit(self.unit)?;
        self.contract
            .send(
                &ERC20::transferCall {
                    to,
                    amount: amount.wei(),
                },
                TxOptions::default(),
            )
            .await
    }

    pub async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: &Currency,
    ) -> Result<TransactionObject> {
        amount.expect_unit(self.unit)?;
        self.contract
            .send(
                &ERC20::transferFromCall {
                    from,
                    to,
                    amount: amount.wei(),
                },
                TxOptions::default(),
            )
            .await
    }
}

/// Wrapped ether: an ERC-20 that mints against ETH sent to `deposit()`.
#[derive(Clone)]
pub struct WethToken {
    token: Erc20Token,
}

impl WethToken {
    pub fn erc20(&self) -> &Erc20Token {
        &self.token
    }

    /// Wrap ETH; the amount may be given in ETH or WETH.
    pub async fn deposit(&self, amount: &Currency) -> Result<TransactionObject> {
        if !amount.is_instance(CurrencyUnit::Eth) {
            amount.expect_unit(CurrencyUnit::Weth)?;
        }
        self.token
            .contract()
            .send(&WETH9::depositCall {}, TxOptions::with_value(amount.wei()))
            .await
    }

    pub async fn withdraw(&self, amount: &Currency) -> Result<TransactionObject> {
        amount.expect_unit(CurrencyUnit::Weth)?;
        self.token
            .contract()
            .send(
                &WETH9::withdrawCall {
                    amount: amount.wei(),
                },
                TxOptions::default(),
            )
            .await
    }
}

/// Pooled ether: WETH joined into the tub.
#[derive(Clone)]
pub struct PethToken {
    token: Erc20Token,
    tub: Contract,
}

impl PethToken {
    pub fn erc20(&self) -> &Erc20Token {
        &self.token
    }

    pub async fn join(&self, amount: &Currency) -> Result<TransactionObject> {
        amount.expect_unit(CurrencyUnit::Peth)?;
        self.tub
            .send(&SaiTub::joinCall { wad: amount.wei() }, TxOptions::default())
            .await
    }

    pub async fn exit(&self, amount: &Currency) -> Result<TransactionObject> {
        amount.expect_unit(CurrencyUnit::Peth)?;
        self.tub
            .send(&SaiTub::exitCall { wad: amount.wei() }, TxOptions::default())
            .await
    }

    /// WETH the tub asks for `amount` of PETH.
    pub async fn weth_for(&self, amount: &Currency) -> Result<Currency> {
        amount.expect_unit(CurrencyUnit::Peth)?;
        let ret = self.tub.call(&SaiTub::askCall { wad: amount.wei() }).await?;
        Ok(CurrencyUnit::Weth.wei(ret.weth))
    }
}

/// Plain ether, held directly by the account.
#[derive(Clone)]
pub struct EtherToken {
    web3: Arc<Web3Service>,
    accounts: Arc<AccountsService>,
    transactions: Arc<TransactionManager>,
}

impl EtherToken {
    pub async fn balance(&self) -> Result<Currency> {
        self.balance_of(self.accounts.current_address()?).await
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Currency> {
        Ok(CurrencyUnit::Eth.wei(self.web3.balance_of(owner).await?))
    }

    pub async fn transfer(&self, to: Address, amount: &Currency) -> Result<TransactionObject> {
        amount.expect_unit(CurrencyUnit::Eth)?;
        self.transactions
            .send(to, Vec::new(), TxOptions::with_value(amount.wei()), "ETH.transfer")
            .await
    }
}

/// Any token the service hands out: plain ether or an ERC-20.
#[derive(Clone)]
pub enum Token {
    Ether(EtherToken),
    Erc20(Erc20Token),
}

impl Token {
    pub fn symbol(&self) -> &'static str {
        self.unit().symbol()
    }

    pub fn unit(&self) -> CurrencyUnit {
        match self {
            Token::Ether(_) => CurrencyUnit::Eth,
            Token::Erc20(token) => token.unit(),
        }
    }

    /// Contract address; plain ether has none.
    pub fn address(&self) -> Option<Address> {
        match self {
            Token::Ether(_) => None,
            Token::Erc20(token) => Some(token.address()),
        }
    }

    pub fn as_erc20(&self) -> Option<&Erc20Token> {
        match self {
            Token::Ether(_) => None,
            Token::Erc20(token) => Some(token),
        }
    }

    pub async fn balance(&self) -> Result<Currency> {
        match self {
            Token::Ether(token) => token.balance().await,
            Token::Erc20(token) => token.balance().await,
        }
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Currency> {
        match self {
            Token::Ether(token) => token.balance_of(owner).await,
            Token::Erc20(token) => token.balance_of(owner).await,
        }
    }

    pub async fn transfer(&self, to: Address, amount: &Currency) -> Result<TransactionObject> {
        match self {
            Token::Ether(token) => token.transfer(to, amount).await,
            Token::Erc20(token) => token.transfer(to, amount).await,
        }
    }
}

pub struct TokenService {
    manager: ServiceManager,
}

impl TokenService {
    pub fn new() -> Self {
        Self {
            manager: ServiceManager::new(roles::TOKEN)
                .dependency(roles::SMART_CONTRACT)
                .dependency(roles::WEB3)
                .dependency(roles::ACCOUNTS)
                .dependency(roles::TRANSACTION_MANAGER),
        }
    }

    pub fn get_tokens(&self) -> Vec<&'static str> {
        TOKENS.to_vec()
    }

    fn contracts(&self) -> Result<Arc<SmartContractService>> {
        self.manager.get::<SmartContractService>(roles::SMART_CONTRACT)
    }

    pub fn get_token(&self, symbol: &str) -> Result<Token> {
        if symbol == ETH {
            return Ok(Token::Ether(self.ether()?));
        }
        self.get_erc20(symbol).map(Token::Erc20)
    }

    /// The ERC-20 contract behind `symbol`. ETH has none.
    pub fn get_erc20(&self, symbol: &str) -> Result<Erc20Token> {
        if symbol == ETH {
            return Err(Error::NotErc20 {
                symbol: symbol.to_string(),
            });
        }
        let name = contract_name(symbol).ok_or_else(|| Error::UnknownToken {
            symbol: symbol.to_string(),
        })?;
        let unit = CurrencyUnit::from_symbol(symbol).ok_or_else(|| Error::UnknownToken {
            symbol: symbol.to_string(),
        })?;
        Ok(Erc20Token {
            unit,
            contract: self.contracts()?.contract_by_name(name)?,
            accounts: self.manager.get::<AccountsService>(roles::ACCOUNTS)?,
        })
    }

    pub fn weth(&self) -> Result<WethToken> {
        Ok(WethToken {
            token: self.get_erc20(WETH)?,
        })
    }

    pub fn peth(&self) -> Result<PethToken> {
        Ok(PethToken {
            token: self.get_erc20(PETH)?,
            tub: self.contracts()?.contract_by_name(addresses::SAI_TUB)?,
        })
    }

    pub fn ether(&self) -> Result<EtherToken> {
        Ok(EtherToken {
            web3: self.manager.get::<Web3Service>(roles::WEB3)?,
            accounts: self.manager.get::<AccountsService>(roles::ACCOUNTS)?,
            transactions: self.manager.get::<TransactionManager>(roles::TRANSACTION_MANAGER)?,
        })
    }

    /// Approve `spender` for an unlimited amount of `symbol` unless it
    /// already holds at least half of the maximum allowance.
    pub async fn require_allowance(&self, symbol: &str, spender: Address) -> Result<Option<Receipt>> {
        let token = self.get_erc20(symbol)?;
        let owner = self
            .manager
            .get::<AccountsService>(roles::ACCOUNTS)?
            .current_address()?;
        let allowance = token.allowance(owner, spender).await?;
        if allowance >= U256::MAX / U256::from(2) {
            return Ok(None);
        }
        tracing::info!(token = symbol, %spender, "approving unlimited allowance");
        let receipt = token.approve_unlimited(spender).await?.mined().await?;
        Ok(Some(receipt))
    }
}

impl Default for TokenService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for TokenService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}
