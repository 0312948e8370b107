mod common;

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use common::*;
use maker_dai_rs::abi::{self, DSProxy, SaiProxy, SaiTub, SaiVox, ERC20, WETH9};
use maker_dai_rs::config::roles;
use maker_dai_rs::services::addresses;
use maker_dai_rs::services::EthereumCdpService;
use maker_dai_rs::{CurrencyUnit, Error};

const FEE_PER_SECOND: u64 = 158_153_903_837_946_257;

fn seed_tub(chain: &MockChain, ink: U256) {
    let tub = contract(addresses::SAI_TUB);
    let zero = vec![0u8; 32];
    chain.set_call::<SaiTub::cupsCall>(
        tub,
        words(&[address_word(account()), word(ink), word(wad(900)), zero]),
    );
    chain.set_call::<SaiTub::perCall>(tub, word(ray(1)));
    chain.set_call::<SaiTub::tagCall>(tub, word(ray(400)));
    chain.set_call::<SaiTub::tabCall>(tub, word(wad(1000)));
    chain.set_call::<SaiTub::matCall>(tub, word(ray(3) / U256::from(2)));
    chain.set_call::<SaiTub::axeCall>(tub, word(ray(113) / U256::from(100)));
    chain.set_call::<SaiTub::feeCall>(tub, word(ray(1) + U256::from(FEE_PER_SECOND)));
    chain.set_call::<SaiTub::safeCall>(tub, word(U256::from(1)));
    chain.set_call::<SaiVox::parCall>(contract(addresses::SAI_VOX), word(ray(1)));
}

async fn service(chain: &Arc<MockChain>) -> Arc<EthereumCdpService> {
    let maker = maker(chain).await;
    maker.service::<EthereumCdpService>(roles::CDP).unwrap()
}

fn route(sent: &[SentTx]) -> Vec<(Address, [u8; 4])> {
    sent.iter().map(|tx| (tx.to, tx.selector())).collect()
}

#[tokio::test]
async fn test_collateral_and_debt() {
    let chain = MockChain::new();
    seed_tub(&chain, wad(10));
    let cdp = service(&chain).await;

    let info = cdp.get_info(1).await.unwrap();
    assert_eq!(info.lad, account());
    assert_eq!(info.art, wad(900));

    assert_eq!(cdp.get_collateral_value(1).await.unwrap(), CurrencyUnit::Eth.whole(10));
    assert_eq!(cdp.get_collateral_value_usd(1).await.unwrap(), CurrencyUnit::Usd.whole(4000));
    assert_eq!(cdp.get_debt_value(1).await.unwrap(), CurrencyUnit::Dai.whole(1000));
    assert_eq!(cdp.get_collateralization_ratio(1).await.unwrap(), Some(4.0));
    assert_eq!(
        cdp.get_liquidation_price(1).await.unwrap(),
        Some(CurrencyUnit::UsdEth.whole(150))
    );
    assert!(cdp.is_cdp_safe(1).await.unwrap());
}

#[tokio::test]
async fn test_empty_cdp_has_no_liquidation_price() {
    let chain = MockChain::new();
    seed_tub(&chain, U256::ZERO);
    let cdp = service(&chain).await;
    assert_eq!(cdp.get_liquidation_price(1).await.unwrap(), None);
}

#[tokio::test]
async fn test_system_parameters() {
    let chain = MockChain::new();
    seed_tub(&chain, wad(1));
    let cdp = service(&chain).await;

    assert!((cdp.get_liquidation_ratio().await.unwrap() - 1.5).abs() < 1e-12);
    assert!((cdp.get_liquidation_penalty().await.unwrap() - 0.13).abs() < 1e-12);
    let fee = cdp.get_annual_governance_fee().await.unwrap();
    assert!((fee - 0.005).abs() < 1e-4, "annual fee {}", fee);
    assert_eq!(cdp.get_target_price().await.unwrap(), CurrencyUnit::UsdDai.whole(1));
}

#[tokio::test]
async fn test_draw_and_wipe() {
    let chain = MockChain::new();
    let cdp = service(&chain).await;
    let tub = contract(addresses::SAI_TUB);

    cdp.draw_dai(7, &CurrencyUnit::Dai.whole(5)).await.unwrap();
    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, tub);
    let draw = sent[0].decode::<SaiTub::drawCall>();
    assert_eq!(draw.cup, abi::cup_id(7));
    assert_eq!(draw.wad, wad(5));

    // No allowance yet: DAI and MKR are approved for the tub before wiping.
    cdp.wipe_dai(7, &CurrencyUnit::Dai.whole(5)).await.unwrap();
    let sent = chain.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[1].to, contract(addresses::SAI));
    assert!(sent[1].calls::<ERC20::approveCall>());
    assert_eq!(sent[2].to, contract(addresses::MKR));
    assert!(sent[3].calls::<SaiTub::wipeCall>());

    assert!(matches!(
        cdp.draw_dai(7, &CurrencyUnit::Eth.whole(5)).await,
        Err(Error::CurrencyMismatch { .. })
    ));
}

#[tokio::test]
async fn test_shut_approves_debt_tokens_first() {
    let chain = MockChain::new();
    let cdp = service(&chain).await;
    let tub = contract(addresses::SAI_TUB);

    cdp.shut_cdp(9).await.unwrap();

    let sent = chain.sent();
    assert_eq!(
        route(&sent),
        vec![
            (contract(addresses::SAI), ERC20::approveCall::SELECTOR),
            (contract(addresses::MKR), ERC20::approveCall::SELECTOR),
            (tub, SaiTub::shutCall::SELECTOR),
        ]
    );
    for approval in &sent[..2] {
        let approve = approval.decode::<ERC20::approveCall>();
        assert_eq!(approve.spender, tub);
        assert_eq!(approve.amount, U256::MAX);
    }
    assert_eq!(sent[2].decode::<SaiTub::shutCall>().cup, abi::cup_id(9));
    assert_eq!(sent[2].value, None);
}

#[tokio::test]
async fn test_shut_skips_granted_allowances() {
    let chain = MockChain::new();
    chain.set_call::<ERC20::allowanceCall>(contract(addresses::SAI), word(U256::MAX));
    chain.set_call::<ERC20::allowanceCall>(contract(addresses::MKR), word(U256::MAX));
    let cdp = service(&chain).await;

    cdp.shut_cdp(9).await.unwrap();
    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].calls::<SaiTub::shutCall>());
}

#[tokio::test]
async fn test_give_transfers_ownership() {
    let chain = MockChain::new();
    let cdp = service(&chain).await;

    cdp.give_cdp(4, addr(0x42)).await.unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, contract(addresses::SAI_TUB));
    let give = sent[0].decode::<SaiTub::giveCall>();
    assert_eq!(give.cup, abi::cup_id(4));
    assert_eq!(give.guy, addr(0x42));
}

#[tokio::test]
async fn test_free_peth() {
    let chain = MockChain::new();
    let cdp = service(&chain).await;

    cdp.free_peth(6, &CurrencyUnit::Peth.parse("1.5").unwrap()).await.unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, contract(addresses::SAI_TUB));
    let free = sent[0].decode::<SaiTub::freeCall>();
    assert_eq!(free.cup, abi::cup_id(6));
    assert_eq!(free.wad, wad(3) / U256::from(2));

    assert!(matches!(
        cdp.free_peth(6, &CurrencyUnit::Eth.whole(1)).await,
        Err(Error::CurrencyMismatch { .. })
    ));
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test]
async fn test_lock_eth_wraps_joins_and_locks() {
    let chain = MockChain::new();
    seed_tub(&chain, wad(0));
    let cdp = service(&chain).await;

    cdp.lock_eth(3, &CurrencyUnit::Eth.parse("0.1").unwrap()).await.unwrap();
    let tenth = wad(1) / U256::from(10);

    let sent = chain.sent();
    assert_eq!(
        route(&sent),
        vec![
            (contract(addresses::SAI_GEM), WETH9::depositCall::SELECTOR),
            (contract(addresses::SAI_GEM), ERC20::approveCall::SELECTOR),
            (contract(addresses::SAI_TUB), SaiTub::joinCall::SELECTOR),
            (contract(addresses::SAI_SKR), ERC20::approveCall::SELECTOR),
            (contract(addresses::SAI_TUB), SaiTub::lockCall::SELECTOR),
        ]
    );
    assert_eq!(sent[0].value, Some(tenth));
    assert_eq!(sent[2].decode::<SaiTub::joinCall>().wad, tenth);
    assert_eq!(sent[4].decode::<SaiTub::lockCall>().wad, tenth);
}

#[tokio::test]
async fn test_lock_weth_joins_at_the_tub_rate() {
    let chain = MockChain::new();
    seed_tub(&chain, wad(0));
    // per = 2: each PETH is backed by two WETH.
    chain.set_call::<SaiTub::perCall>(contract(addresses::SAI_TUB), word(ray(2)));
    let cdp = service(&chain).await;

    cdp.lock_weth(8, &CurrencyUnit::Weth.whole(4)).await.unwrap();

    let sent = chain.sent();
    assert_eq!(
        route(&sent),
        vec![
            (contract(addresses::SAI_GEM), ERC20::approveCall::SELECTOR),
            (contract(addresses::SAI_TUB), SaiTub::joinCall::SELECTOR),
            (contract(addresses::SAI_SKR), ERC20::approveCall::SELECTOR),
            (contract(addresses::SAI_TUB), SaiTub::lockCall::SELECTOR),
        ]
    );
    assert!(sent.iter().all(|tx| tx.value.is_none()));
    assert_eq!(
        sent[0].decode::<ERC20::approveCall>().spender,
        contract(addresses::SAI_TUB)
    );
    assert_eq!(sent[1].decode::<SaiTub::joinCall>().wad, wad(2));
    let lock = sent[3].decode::<SaiTub::lockCall>();
    assert_eq!(lock.cup, abi::cup_id(8));
    assert_eq!(lock.wad, wad(2));

    assert!(matches!(
        cdp.lock_weth(8, &CurrencyUnit::Eth.whole(4)).await,
        Err(Error::CurrencyMismatch { .. })
    ));
}

#[tokio::test]
async fn test_proxy_calls_go_through_execute() {
    let chain = MockChain::new();
    let cdp = service(&chain).await;
    let proxy = addr(0x99);
    let tub = contract(addresses::SAI_TUB);

    chain.push_logs(vec![new_cup_log(12)]);
    assert_eq!(cdp.open_proxy_cdp(proxy).await.unwrap(), 12);

    cdp.lock_eth_proxy(proxy, 12, &CurrencyUnit::Eth.whole(1)).await.unwrap();
    cdp.draw_dai_proxy(proxy, 12, &CurrencyUnit::Dai.whole(20)).await.unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 3);
    for tx in &sent {
        assert_eq!(tx.to, proxy);
        assert!(tx.calls::<DSProxy::executeCall>());
        assert_eq!(
            tx.decode::<DSProxy::executeCall>().target,
            contract(addresses::SAI_PROXY)
        );
    }

    let (_, open) = sent[0].executed::<SaiProxy::openCall>();
    assert_eq!(open.tub, tub);
    let (_, lock) = sent[1].executed::<SaiProxy::lockCall>();
    assert_eq!(lock.cup, abi::cup_id(12));
    assert_eq!(sent[1].value, Some(wad(1)));

    let (_, draw) = sent[2].executed::<SaiProxy::drawCall>();
    assert_eq!(draw.tub, tub);
    assert_eq!(draw.cup, abi::cup_id(12));
    assert_eq!(draw.wad, wad(20));
}

#[tokio::test]
async fn test_proxy_cdp_shut_give_and_free() {
    let chain = MockChain::new();
    seed_tub(&chain, wad(5));
    let maker = maker(&chain).await;
    let proxy = addr(0x99);
    let tub = contract(addresses::SAI_TUB);
    let sai_proxy = contract(addresses::SAI_PROXY);

    let cdp = maker.get_proxy_cdp(12, proxy).await.unwrap();
    assert_eq!(cdp.id(), 12);

    cdp.free_eth(&CurrencyUnit::Eth.whole(2)).await.unwrap();
    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, proxy);
    assert_eq!(sent[0].value, None);
    let (target, free) = sent[0].executed::<SaiProxy::freeCall>();
    assert_eq!(target, sai_proxy);
    assert_eq!((free.tub, free.cup, free.wad), (tub, abi::cup_id(12), wad(2)));

    // The proxy, not the tub, pulls DAI and MKR when shutting.
    cdp.shut().await.unwrap();
    let sent = chain.sent();
    assert_eq!(
        route(&sent[1..]),
        vec![
            (contract(addresses::SAI), ERC20::approveCall::SELECTOR),
            (contract(addresses::MKR), ERC20::approveCall::SELECTOR),
            (proxy, DSProxy::executeCall::SELECTOR),
        ]
    );
    assert_eq!(sent[1].decode::<ERC20::approveCall>().spender, proxy);
    assert_eq!(sent[2].decode::<ERC20::approveCall>().spender, proxy);
    let (target, shut) = sent[3].executed::<SaiProxy::shutCall>();
    assert_eq!(target, sai_proxy);
    assert_eq!((shut.tub, shut.cup), (tub, abi::cup_id(12)));

    cdp.give(addr(0x42)).await.unwrap();
    let sent = chain.sent();
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[4].to, proxy);
    let (target, give) = sent[4].executed::<SaiProxy::giveCall>();
    assert_eq!(target, sai_proxy);
    assert_eq!(give.tub, tub);
    assert_eq!(give.cup, abi::cup_id(12));
    assert_eq!(give.lad, addr(0x42));

    assert!(matches!(
        cdp.free_eth(&CurrencyUnit::Peth.whole(1)).await,
        Err(Error::CurrencyMismatch { .. })
    ));
}
