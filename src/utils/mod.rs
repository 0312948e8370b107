use alloy_primitives::utils::format_units;
use alloy_primitives::U256;

use crate::error::{Error, Result};

/// 10^18, the scale of token amounts and prices.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 10^27, the scale of the tub's rates and ratios.
pub const RAY: U256 = U256::from_limbs([11_515_845_246_265_065_472, 54_210_108, 0, 0]);

pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

pub fn remove_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url[..url.len() - 1].to_string()
    } else {
        url.to_string()
    }
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
pub fn parse_quantity(value: &str) -> Result<U256> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| Error::invalid_response(format!("bad quantity {}: {}", value, e)))
}

pub fn parse_quantity_u64(value: &str) -> Result<u64> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity)
        .map_err(|_| Error::invalid_response(format!("quantity {} does not fit u64", value)))
}

pub fn to_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

pub fn decode_hex_data(value: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| Error::invalid_response(format!("bad hex data: {}", e)))
}

/// `a * b / WAD`, rounding down.
pub fn wad_mul(a: U256, b: U256) -> Result<U256> {
    mul_div(a, b, WAD, "wad_mul")
}

/// `a * WAD / b`, rounding down.
pub fn wad_div(a: U256, b: U256) -> Result<U256> {
    mul_div(a, WAD, b, "wad_div")
}

/// `a * b / RAY`, rounding down.
pub fn ray_mul(a: U256, b: U256) -> Result<U256> {
    mul_div(a, b, RAY, "ray_mul")
}

/// `a * RAY / b`, rounding down.
pub fn ray_div(a: U256, b: U256) -> Result<U256> {
    mul_div(a, RAY, b, "ray_div")
}

fn mul_div(a: U256, b: U256, denominator: U256, operation: &str) -> Result<U256> {
    if denominator.is_zero() {
        return Err(Error::Overflow {
            operation: format!("{} (division by zero)", operation),
        });
    }
    a.checked_mul(b)
        .map(|product| product / denominator)
        .ok_or_else(|| Error::Overflow {
            operation: operation.to_string(),
        })
}

/// Lossy conversion of a fixed point integer with `decimals` places.
pub fn fixed_to_f64(value: U256, decimals: u8) -> Result<f64> {
    let text = format_units(value, decimals).map_err(|e| Error::Amount {
        value: value.to_string(),
        message: e.to_string(),
    })?;
    text.parse::<f64>().map_err(|e| Error::Amount {
        value: text.clone(),
        message: e.to_string(),
    })
}

pub fn ray_to_f64(value: U256) -> Result<f64> {
    fixed_to_f64(value, 27)
}

pub fn wad_to_f64(value: U256) -> Result<f64> {
    fixed_to_f64(value, 18)
}

pub async fn retry<T, E, F, Fut>(mut retries: u32, base_delay_ms: u64, mut f: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if retries == 0 => return Err(e),
            Err(e) => {
                // Exponential backoff: base_delay * 2^attempt, capped at 30s
                let delay = (base_delay_ms * (1u64 << attempt.min(5))).min(30_000);
                tracing::warn!(attempt = attempt + 1, delay_ms = delay, error = ?e, "retrying request");
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                retries -= 1;
                attempt += 1;
            }
        }
    }
}
