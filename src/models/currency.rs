use std::cmp::Ordering;
use std::fmt;

use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::{wad_to_f64, RAY, WAD};

const DECIMALS: u8 = 18;

/// Every amount the library handles is an 18-decimal fixed point number
/// tagged with the unit it is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyUnit {
    Eth,
    Peth,
    Weth,
    Dai,
    Mkr,
    OldMkr,
    Usd,
    UsdEth,
    UsdMkr,
    UsdPeth,
    UsdDai,
}

impl CurrencyUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            CurrencyUnit::Eth => "ETH",
            CurrencyUnit::Peth => "PETH",
            CurrencyUnit::Weth => "WETH",
            CurrencyUnit::Dai => "DAI",
            CurrencyUnit::Mkr => "MKR",
            CurrencyUnit::OldMkr => "OLD_MKR",
            CurrencyUnit::Usd => "USD",
            CurrencyUnit::UsdEth => "USD/ETH",
            CurrencyUnit::UsdMkr => "USD/MKR",
            CurrencyUnit::UsdPeth => "USD/PETH",
            CurrencyUnit::UsdDai => "USD/DAI",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<CurrencyUnit> {
        let unit = match symbol {
            "ETH" => CurrencyUnit::Eth,
            "PETH" => CurrencyUnit::Peth,
            "WETH" => CurrencyUnit::Weth,
            "DAI" => CurrencyUnit::Dai,
            "MKR" => CurrencyUnit::Mkr,
            "OLD_MKR" => CurrencyUnit::OldMkr,
            "USD" => CurrencyUnit::Usd,
            "USD/ETH" => CurrencyUnit::UsdEth,
            "USD/MKR" => CurrencyUnit::UsdMkr,
            "USD/PETH" => CurrencyUnit::UsdPeth,
            "USD/DAI" => CurrencyUnit::UsdDai,
            _ => return None,
        };
        Some(unit)
    }

    pub fn is_price(&self) -> bool {
        matches!(
            self,
            CurrencyUnit::UsdEth | CurrencyUnit::UsdMkr | CurrencyUnit::UsdPeth | CurrencyUnit::UsdDai
        )
    }

    /// Parse a decimal string such as `"0.1"`, `".1"` or `"400"`.
    pub fn parse(self, value: &str) -> Result<Currency> {
        Ok(Currency::new(self, parse_wad(value)?))
    }

    pub fn whole(self, value: u64) -> Currency {
        Currency::new(self, U256::from(value) * WAD)
    }

    pub fn wei(self, value: U256) -> Currency {
        Currency::new(self, value)
    }

    /// Build from a 27-decimal value, truncating the extra precision.
    pub fn ray(self, value: U256) -> Currency {
        Currency::new(self, value / (RAY / WAD))
    }
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    unit: CurrencyUnit,
    wei: U256,
}

impl Currency {
    pub fn new(unit: CurrencyUnit, wei: U256) -> Self {
        Self { unit, wei }
    }

    pub fn unit(&self) -> CurrencyUnit {
        self.unit
    }

    pub fn symbol(&self) -> &'static str {
        self.unit.symbol()
    }

    pub fn wei(&self) -> U256 {
        self.wei
    }

    pub fn is_instance(&self, unit: CurrencyUnit) -> bool {
        self.unit == unit
    }

    pub fn is_zero(&self) -> bool {
        self.wei.is_zero()
    }

    pub fn to_f64(&self) -> Result<f64> {
        wad_to_f64(self.wei)
    }

    /// Reinterpret the same amount in another unit (ETH → WETH, WETH → PETH at par, ...).
    pub fn cast(&self, unit: CurrencyUnit) -> Currency {
        Currency::new(unit, self.wei)
    }

    pub fn expect_unit(&self, unit: CurrencyUnit) -> Result<&Self> {
        if self.unit != unit {
            return Err(Error::CurrencyMismatch {
                expected: unit.symbol().to_string(),
                actual: self.unit.symbol().to_string(),
            });
        }
        Ok(self)
    }

    pub fn gt(&self, other: &Currency) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Greater))
    }

    pub fn lt(&self, other: &Currency) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Less))
    }

    pub fn checked_add(&self, other: &Currency) -> Result<Currency> {
        other.expect_unit(self.unit)?;
        self.wei
            .checked_add(other.wei)
            .map(|wei| Currency::new(self.unit, wei))
            .ok_or_else(|| Error::Overflow {
                operation: format!("{} addition", self.unit),
            })
    }

    pub fn checked_sub(&self, other: &Currency) -> Result<Currency> {
        other.expect_unit(self.unit)?;
        self.wei
            .checked_sub(other.wei)
            .map(|wei| Currency::new(self.unit, wei))
            .ok_or_else(|| Error::Overflow {
                operation: format!("{} subtraction", self.unit),
            })
    }

    /// The value as a 32-byte big-endian hex word, as the price feeds take it.
    pub fn to_contract_value(&self) -> String {
        format!("0x{}", hex::encode(self.wei.to_be_bytes::<32>()))
    }

    pub fn decimal_string(&self) -> String {
        let text = match format_units(self.wei, DECIMALS) {
            Ok(text) => text,
            Err(_) => return self.wei.to_string(),
        };
        match text.split_once('.') {
            Some((whole, fraction)) => {
                let fraction = fraction.trim_end_matches('0');
                if fraction.is_empty() {
                    whole.to_string()
                } else {
                    format!("{}.{}", whole, fraction)
                }
            }
            None => text,
        }
    }
}

impl PartialOrd for Currency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.unit != other.unit {
            return None;
        }
        Some(self.wei.cmp(&other.wei))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.decimal_string(), self.unit)
    }
}

/// Parse a non-negative decimal string into an 18-decimal integer.
pub fn parse_wad(value: &str) -> Result<U256> {
    let trimmed = value.trim();
    let invalid = |message: &str| Error::Amount {
        value: value.to_string(),
        message: message.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("empty amount"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("negative amounts are not allowed"));
    }
    let normalized = if trimmed.starts_with('.') {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };
    parse_units(&normalized, DECIMALS)
        .map(|units| units.get_absolute())
        .map_err(|e| invalid(&e.to_string()))
}

/// Format `value` of `unit` for a bytes32 contract argument.
pub fn value_for_contract(value: &str, unit: CurrencyUnit) -> Result<String> {
    Ok(unit.parse(value)?.to_contract_value())
}
