//! Typed interfaces of the contracts the library talks to. Calls are
//! encoded with [`SolCall::abi_encode`](alloy_sol_types::SolCall) and
//! results decoded with `abi_decode_returns`.
use alloy_primitives::{B256, U256};
use alloy_sol_types::sol;

use crate::error::{Error, Result};

sol! {
    /// DSToken: DAI, MKR, PETH and the ERC-20 face of WETH.
    interface ERC20 {
        function totalSupply() external view returns (uint256 supply);
        function balanceOf(address owner) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function approve(address spender, uint256 amount) external returns (bool ok);
        function transfer(address to, uint256 amount) external returns (bool ok);
        function transferFrom(address from, address to, uint256 amount) external returns (bool ok);
    }

    interface WETH9 {
        function deposit() external payable;
        function withdraw(uint256 amount) external;
    }

    /// The Sai tub: CDP records, collateral pool and risk parameters.
    interface SaiTub {
        event LogNewCup(address indexed lad, bytes32 cup);

        function open() external returns (bytes32 cup);
        function cups(bytes32 cup) external view returns (address lad, uint256 ink, uint256 art, uint256 ire);
        function lock(bytes32 cup, uint256 wad) external;
        function free(bytes32 cup, uint256 wad) external;
        function draw(bytes32 cup, uint256 wad) external;
        function wipe(bytes32 cup, uint256 wad) external;
        function shut(bytes32 cup) external;
        function give(bytes32 cup, address guy) external;
        function join(uint256 wad) external;
        function exit(uint256 wad) external;
        function ask(uint256 wad) external view returns (uint256 weth);
        function tab(bytes32 cup) external returns (uint256 debt);
        function safe(bytes32 cup) external returns (bool ok);
        function per() external view returns (uint256 ray);
        function tag() external view returns (uint256 ray);
        function mat() external view returns (uint256 ray);
        function axe() external view returns (uint256 ray);
        function fee() external view returns (uint256 ray);
    }

    /// Price feeds (pip for ETH, pep for MKR).
    interface DSValue {
        function read() external view returns (bytes32 value);
        function poke(bytes32 value) external;
    }

    interface SaiVox {
        function par() external returns (uint256 ray);
    }

    interface ProxyRegistry {
        function proxies(address owner) external view returns (address proxy);
        function build() external returns (address proxy);
    }

    interface DSProxy {
        function owner() external view returns (address owner);
        function execute(address target, bytes calldata data) external payable returns (bytes memory response);
    }

    /// Library executed by a DSProxy against the tub.
    interface SaiProxy {
        function open(address tub) external returns (bytes32 cup);
        function lock(address tub, bytes32 cup) external payable;
        function free(address tub, bytes32 cup, uint256 wad) external;
        function draw(address tub, bytes32 cup, uint256 wad) external;
        function wipe(address tub, bytes32 cup, uint256 wad) external;
        function shut(address tub, bytes32 cup) external;
        function give(address tub, bytes32 cup, address lad) external;
    }

    /// The OTC order book.
    interface MatchingMarket {
        function getBuyAmount(address buy_gem, address pay_gem, uint256 pay_amt) external view returns (uint256 fill_amt);
        function getPayAmount(address pay_gem, address buy_gem, uint256 buy_amt) external view returns (uint256 fill_amt);
    }

    /// Trade entry points executed by a DSProxy.
    interface OasisDirectProxy {
        function sellAllAmount(address otc, address pay_token, uint256 pay_amt, address buy_token, uint256 min_buy_amt) external returns (uint256 buy_amt);
        function sellAllAmountPayEth(address otc, address weth_token, address buy_token, uint256 min_buy_amt) external payable returns (uint256 buy_amt);
        function sellAllAmountBuyEth(address otc, address pay_token, uint256 pay_amt, address weth_token, uint256 min_buy_amt) external returns (uint256 weth_amt);
        function buyAllAmount(address otc, address buy_token, uint256 buy_amt, address pay_token, uint256 max_pay_amt) external returns (uint256 pay_amt);
        function buyAllAmountPayEth(address otc, address buy_token, uint256 buy_amt, address weth_token) external payable returns (uint256 weth_amt);
        function buyAllAmountBuyEth(address otc, address weth_token, uint256 weth_amt, address pay_token, uint256 max_pay_amt) external returns (uint256 pay_amt);
    }

    /// Builds a DSProxy and trades through it in one transaction.
    interface ProxyCreationAndExecute {
        function createAndSellAllAmountPayEth(address factory, address otc, address buy_token, uint256 min_buy_amt) external payable returns (address proxy, uint256 buy_amt);
        function createAndBuyAllAmountPayEth(address factory, address otc, address buy_token, uint256 buy_amt) external payable returns (address proxy, uint256 weth_amt);
    }
}

/// A CDP id as the tub expects it: the number as a big-endian bytes32.
pub fn cup_id(id: u64) -> B256 {
    B256::from(U256::from(id).to_be_bytes::<32>())
}

pub fn cup_to_id(cup: B256) -> Result<u64> {
    u64::try_from(U256::from_be_bytes(cup.0))
        .map_err(|_| Error::abi(format!("cup {} does not fit u64", cup)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use alloy_sol_types::{SolCall, SolEvent};

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(ERC20::balanceOfCall::SELECTOR), "70a08231");
        assert_eq!(hex::encode(ERC20::transferCall::SELECTOR), "a9059cbb");
        assert_eq!(hex::encode(ERC20::approveCall::SELECTOR), "095ea7b3");
        assert_eq!(DSProxy::executeCall::SIGNATURE, "execute(address,bytes)");
        assert_eq!(SaiTub::LogNewCup::SIGNATURE, "LogNewCup(address,bytes32)");
    }

    #[test]
    fn test_proxy_execute_layout() {
        let target = Address::repeat_byte(0x01);
        let payload = vec![0xde, 0xad, 0xbe, 0xef];
        let encoded = DSProxy::executeCall {
            target,
            data: payload.clone().into(),
        }
        .abi_encode();

        // head: address, offset(64); tail: length, padded payload
        assert_eq!(encoded.len(), 4 + 4 * 32);
        let args = &encoded[4..];
        assert_eq!(args[63], 64);
        assert_eq!(args[95], 4);
        assert_eq!(&args[96..100], payload.as_slice());
        assert!(args[100..].iter().all(|b| *b == 0));

        let decoded = DSProxy::executeCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded.target, target);
        assert_eq!(decoded.data.to_vec(), payload);
    }

    #[test]
    fn test_short_return_data_is_an_error() {
        let data = [0u8; 64];
        assert!(SaiTub::cupsCall::abi_decode_returns(&data, false).is_err());
        assert!(SaiTub::perCall::abi_decode_returns(&data, false).is_ok());
    }

    #[test]
    fn test_cup_ids() {
        let cup = cup_id(42);
        assert_eq!(cup[31], 42);
        assert_eq!(cup_to_id(cup).unwrap(), 42);
        assert!(cup_to_id(B256::repeat_byte(0xff)).is_err());
    }
}
