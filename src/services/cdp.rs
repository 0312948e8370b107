use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use crate::abi::{self, cup_id, SaiProxy, SaiTub, SaiVox};
use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::models::cdp::CdpInfo;
use crate::models::currency::{Currency, CurrencyUnit};
use crate::models::receipt::Receipt;
use crate::services::addresses;
use crate::services::price::PriceService;
use crate::services::smart_contract::{Contract, SmartContractService};
use crate::services::token::{self, TokenService};
use crate::services::transaction::TxOptions;
use crate::utils::{ray_div, ray_mul, ray_to_f64, wad_div, wad_mul, RAY, SECONDS_PER_YEAR};

/// Pull the new cup id out of the tub's `LogNewCup(address indexed lad, bytes32 cup)`.
pub fn cup_from_receipt(receipt: &Receipt) -> Result<u64> {
    let log = receipt
        .logs_with_topic(SaiTub::LogNewCup::SIGNATURE_HASH)
        .next()
        .ok_or_else(|| Error::MissingEvent {
            event: SaiTub::LogNewCup::SIGNATURE.to_string(),
            hash: receipt.transaction_hash.to_string(),
        })?;
    let event = SaiTub::LogNewCup::decode_raw_log(log.topics.iter().copied(), &log.data, false)?;
    abi::cup_to_id(event.cup)
}

/// Opens and manages Sai CDPs ("cups") on the tub, directly or through
/// the user's DSProxy and the SaiProxy library.
pub struct EthereumCdpService {
    manager: ServiceManager,
}

impl EthereumCdpService {
    pub fn new() -> Self {
        Self {
            manager: ServiceManager::new(roles::CDP)
                .dependency(roles::SMART_CONTRACT)
                .dependency(roles::TOKEN)
                .dependency(roles::PRICE),
        }
    }

    fn contract(&self, name: &str) -> Result<Contract> {
        self.manager
            .get::<SmartContractService>(roles::SMART_CONTRACT)?
            .contract_by_name(name)
    }

    fn tub(&self) -> Result<Contract> {
        self.contract(addresses::SAI_TUB)
    }

    fn tokens(&self) -> Result<Arc<TokenService>> {
        self.manager.get::<TokenService>(roles::TOKEN)
    }

    async fn tub_send<C: SolCall>(&self, call: &C) -> Result<Receipt> {
        self.tub()?
            .send(call, TxOptions::default())
            .await?
            .mined()
            .await
    }

    pub async fn open_cdp(&self) -> Result<u64> {
        let receipt = self.tub_send(&SaiTub::openCall {}).await?;
        let id = cup_from_receipt(&receipt)?;
        tracing::info!(cdp = id, "opened CDP");
        Ok(id)
    }

    pub async fn get_info(&self, id: u64) -> Result<CdpInfo> {
        let cup = self.tub()?.call(&SaiTub::cupsCall { cup: cup_id(id) }).await?;
        Ok(cup.into())
    }

    /// Wrap ETH and join it into the tub; returns the PETH received.
    pub async fn convert_eth_to_peth(&self, eth: &Currency) -> Result<Currency> {
        eth.expect_unit(CurrencyUnit::Eth)?;
        self.tokens()?.weth()?.deposit(eth).await?.mined().await?;
        self.join_weth(&eth.cast(CurrencyUnit::Weth)).await
    }

    async fn join_weth(&self, weth: &Currency) -> Result<Currency> {
        weth.expect_unit(CurrencyUnit::Weth)?;
        let tokens = self.tokens()?;
        let tub = self.tub()?;
        tokens.require_allowance(token::WETH, tub.address()).await?;

        let per = tub.call(&SaiTub::perCall {}).await?.ray;
        let peth = CurrencyUnit::Peth.wei(ray_div(weth.wei(), per)?);
        tokens.peth()?.join(&peth).await?.mined().await?;
        Ok(peth)
    }

    pub async fn lock_eth(&self, id: u64, eth: &Currency) -> Result<Receipt> {
        let peth = self.convert_eth_to_peth(eth).await?;
        self.lock_peth(id, &peth).await
    }

    pub async fn lock_weth(&self, id: u64, weth: &Currency) -> Result<Receipt> {
        let peth = self.join_weth(weth).await?;
        self.lock_peth(id, &peth).await
    }

    pub async fn lock_peth(&self, id: u64, peth: &Currency) -> Result<Receipt> {
        peth.expect_unit(CurrencyUnit::Peth)?;
        let tub = self.tub()?.address();
        self.tokens()?.require_allowance(token::PETH, tub).await?;
        self.tub_send(&SaiTub::lockCall {
            cup: cup_id(id),
            wad: peth.wei(),
        })
        .await
    }

    pub async fn free_peth(&self, id: u64, peth: &Currency) -> Result<Receipt> {
        peth.expect_unit(CurrencyUnit::Peth)?;
        self.tub_send(&SaiTub::freeCall {
            cup: cup_id(id),
            wad: peth.wei(),
        })
        .await
    }

    pub async fn draw_dai(&self, id: u64, dai: &Currency) -> Result<Receipt> {
        dai.expect_unit(CurrencyUnit::Dai)?;
        self.tub_send(&SaiTub::drawCall {
            cup: cup_id(id),
            wad: dai.wei(),
        })
        .await
    }

    /// Pay back DAI; the tub also takes the stability fee in MKR.
    pub async fn wipe_dai(&self, id: u64, dai: &Currency) -> Result<Receipt> {
        dai.expect_unit(CurrencyUnit::Dai)?;
        self.allow_debt_payment(self.tub()?.address()).await?;
        self.tub_send(&SaiTub::wipeCall {
            cup: cup_id(id),
            wad: dai.wei(),
        })
        .await
    }

    pub async fn shut_cdp(&self, id: u64) -> Result<Receipt> {
        self.allow_debt_payment(self.tub()?.address()).await?;
        self.tub_send(&SaiTub::shutCall { cup: cup_id(id) }).await
    }

    pub async fn give_cdp(&self, id: u64, new_owner: Address) -> Result<Receipt> {
        self.tub_send(&SaiTub::giveCall {
            cup: cup_id(id),
            guy: new_owner,
        })
        .await
    }

    async fn allow_debt_payment(&self, spender: Address) -> Result<()> {
        let tokens = self.tokens()?;
        tokens.require_allowance(token::DAI, spender).await?;
        tokens.require_allowance(token::MKR, spender).await?;
        Ok(())
    }

    /// Locked collateral expressed in ETH (`ink * per`).
    pub async fn get_collateral_value(&self, id: u64) -> Result<Currency> {
        let info = self.get_info(id).await?;
        let per = self.tub()?.call(&SaiTub::perCall {}).await?.ray;
        Ok(CurrencyUnit::Eth.wei(ray_mul(info.ink, per)?))
    }

    pub async fn get_collateral_value_usd(&self, id: u64) -> Result<Currency> {
        let info = self.get_info(id).await?;
        let price = self
            .manager
            .get::<PriceService>(roles::PRICE)?
            .get_peth_price()
            .await?;
        Ok(CurrencyUnit::Usd.wei(wad_mul(info.ink, price.wei())?))
    }

    /// Outstanding debt including accrued stability fees.
    pub async fn get_debt_value(&self, id: u64) -> Result<Currency> {
        let tab = self.tub()?.call(&SaiTub::tabCall { cup: cup_id(id) }).await?;
        Ok(CurrencyUnit::Dai.wei(tab.debt))
    }

    /// Collateral USD value over debt; `None` when nothing is drawn.
    pub async fn get_collateralization_ratio(&self, id: u64) -> Result<Option<f64>> {
        let debt = self.get_debt_value(id).await?;
        if debt.is_zero() {
            return Ok(None);
        }
        let collateral = self.get_collateral_value_usd(id).await?;
        Ok(Some(collateral.to_f64()? / debt.to_f64()?))
    }

    /// ETH price at which the CDP becomes unsafe; `None` without collateral.
    pub async fn get_liquidation_price(&self, id: u64) -> Result<Option<Currency>> {
        let collateral = self.get_collateral_value(id).await?;
        if collateral.is_zero() {
            return Ok(None);
        }
        let debt = self.get_debt_value(id).await?;
        let mat = self.tub()?.call(&SaiTub::matCall {}).await?.ray;
        let required = ray_mul(debt.wei(), mat)?;
        Ok(Some(CurrencyUnit::UsdEth.wei(wad_div(required, collateral.wei())?)))
    }

    pub async fn is_cdp_safe(&self, id: u64) -> Result<bool> {
        let safe = self.tub()?.call(&SaiTub::safeCall { cup: cup_id(id) }).await?;
        Ok(safe.ok)
    }

    /// Minimum collateral-to-debt ratio, e.g. 1.5.
    pub async fn get_liquidation_ratio(&self) -> Result<f64> {
        ray_to_f64(self.tub()?.call(&SaiTub::matCall {}).await?.ray)
    }

    /// Extra share of the debt taken on liquidation, e.g. 0.13.
    pub async fn get_liquidation_penalty(&self) -> Result<f64> {
        let axe = self.tub()?.call(&SaiTub::axeCall {}).await?.ray;
        ray_to_f64(axe.saturating_sub(RAY))
    }

    /// The per-second governance fee compounded over a year.
    pub async fn get_annual_governance_fee(&self) -> Result<f64> {
        let fee = self.tub()?.call(&SaiTub::feeCall {}).await?.ray;
        let per_second = ray_to_f64(fee.saturating_sub(RAY))?;
        Ok((per_second.ln_1p() * SECONDS_PER_YEAR).exp_m1())
    }

    pub async fn get_target_price(&self) -> Result<Currency> {
        let par = self
            .contract(addresses::SAI_VOX)?
            .call(&SaiVox::parCall {})
            .await?;
        Ok(CurrencyUnit::UsdDai.ray(par.ray))
    }

    async fn proxy_send<C: SolCall>(&self, proxy: Address, call: &C, value: Option<U256>) -> Result<Receipt> {
        let options = TxOptions {
            value,
            ds_proxy: Some(proxy),
            ..TxOptions::default()
        };
        self.contract(addresses::SAI_PROXY)?
            .send(call, options)
            .await?
            .mined()
            .await
    }

    pub async fn open_proxy_cdp(&self, proxy: Address) -> Result<u64> {
        let tub = self.tub()?.address();
        let receipt = self.proxy_send(proxy, &SaiProxy::openCall { tub }, None).await?;
        let id = cup_from_receipt(&receipt)?;
        tracing::info!(cdp = id, %proxy, "opened CDP through proxy");
        Ok(id)
    }

    pub async fn lock_eth_proxy(&self, proxy: Address, id: u64, eth: &Currency) -> Result<Receipt> {
        eth.expect_unit(CurrencyUnit::Eth)?;
        let call = SaiProxy::lockCall {
            tub: self.tub()?.address(),
            cup: cup_id(id),
        };
        self.proxy_send(proxy, &call, Some(eth.wei())).await
    }

    /// Free locked collateral back to the owner as ETH.
    pub async fn free_eth_proxy(&self, proxy: Address, id: u64, eth: &Currency) -> Result<Receipt> {
        eth.expect_unit(CurrencyUnit::Eth)?;
        let call = SaiProxy::freeCall {
            tub: self.tub()?.address(),
            cup: cup_id(id),
            wad: eth.wei(),
        };
        self.proxy_send(proxy, &call, None).await
    }

    pub async fn draw_dai_proxy(&self, proxy: Address, id: u64, dai: &Currency) -> Result<Receipt> {
        dai.expect_unit(CurrencyUnit::Dai)?;
        let call = SaiProxy::drawCall {
            tub: self.tub()?.address(),
            cup: cup_id(id),
            wad: dai.wei(),
        };
        self.proxy_send(proxy, &call, None).await
    }

    pub async fn wipe_dai_proxy(&self, proxy: Address, id: u64, dai: &Currency) -> Result<Receipt> {
        dai.expect_unit(CurrencyUnit::Dai)?;
        self.allow_debt_payment(proxy).await?;
        let call = SaiProxy::wipeCall {
            tub: self.tub()?.address(),
            cup: cup_id(id),
            wad: dai.wei(),
        };
        self.proxy_send(proxy, &call, None).await
    }

    pub async fn shut_proxy(&self, proxy: Address, id: u64) -> Result<Receipt> {
        self.allow_debt_payment(proxy).await?;
        let call = SaiProxy::shutCall {
            tub: self.tub()?.address(),
            cup: cup_id(id),
        };
        self.proxy_send(proxy, &call, None).await
    }

    pub async fn give_proxy(&self, proxy: Address, id: u64, new_owner: Address) -> Result<Receipt> {
        let call = SaiProxy::giveCall {
            tub: self.tub()?.address(),
            cup: cup_id(id),
            lad: new_owner,
        };
        self.proxy_send(proxy, &call, None).await
    }
}

impl Default for EthereumCdpService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for EthereumCdpService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}
