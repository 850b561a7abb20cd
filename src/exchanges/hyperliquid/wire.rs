//! Canonical byte encodings that feed the action hash.
//!
//! Two sides must agree bit for bit on these bytes: the client that signs and
//! the exchange that recovers the signer. Map keys are written in the order
//! the value serializes them, integers take the smallest MessagePack width
//! that fits, and decimal quantities travel as normalized strings.

use super::types::Action;
use crate::core::errors::ExchangeError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

/// Decimal places used for prices and sizes on the wire
pub const WIRE_DECIMALS: usize = 8;

// Tolerance between a value and its rounded text form
const ROUNDING_TOLERANCE: f64 = 1e-12;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// An action whose serialized field order is fixed by its type.
///
/// Dynamic maps such as `serde_json::Value` sort their keys and would hash
/// differently from what the exchange reconstructs, so only the typed wire
/// actions implement this.
pub trait WireAction: Serialize + sealed::Sealed {}

impl sealed::Sealed for Action {}
impl WireAction for Action {}

/// MessagePack bytes of an action, keys kept in declaration order
///
/// ```compile_fail
/// use lotusx_hyperliquid::exchanges::hyperliquid::wire::encode_action;
///
/// let action = serde_json::json!({"type": "cancel", "cancels": []});
/// encode_action(&action).unwrap();
/// ```
pub fn encode_action<T: WireAction>(action: &T) -> Result<Vec<u8>, ExchangeError> {
    Ok(rmp_serde::to_vec_named(action)?)
}

/// Shortest decimal string for `value` at [`WIRE_DECIMALS`] places
#[inline]
pub fn encode_decimal(value: f64) -> Result<String, ExchangeError> {
    encode_decimal_with_precision(value, WIRE_DECIMALS)
}

/// Round to `max_decimals` places and strip trailing zeros.
///
/// Fails with `PrecisionLoss` when rounding would move the value by 1e-12 or
/// more; a negative zero comes out as `"0"`.
pub fn encode_decimal_with_precision(
    value: f64,
    max_decimals: usize,
) -> Result<String, ExchangeError> {
    if !value.is_finite() {
        return Err(ExchangeError::encoding(format!(
            "cannot encode non-finite number {}",
            value
        )));
    }

    let rounded = format!("{:.*}", max_decimals, value);
    let parsed: f64 = rounded
        .parse()
        .map_err(|e| ExchangeError::encoding(format!("{}: {}", rounded, e)))?;
    if (parsed - value).abs() >= ROUNDING_TOLERANCE {
        return Err(ExchangeError::PrecisionLoss {
            value,
            max_decimals,
        });
    }

    let decimal = Decimal::from_str(&rounded)
        .map_err(|e| ExchangeError::encoding(format!("{} out of range: {}", rounded, e)))?;
    if decimal.is_zero() {
        return Ok("0".to_string());
    }
    Ok(decimal.normalize().to_string())
}

/// 20 raw bytes of a `0x`-prefixed hex address
pub fn address_bytes(address: &str) -> Result<[u8; 20], ExchangeError> {
    let raw = hex::decode(address.trim_start_matches("0x"))
        .map_err(|e| ExchangeError::encoding(format!("invalid address {}: {}", address, e)))?;
    <[u8; 20]>::try_from(raw.as_slice()).map_err(|_| {
        ExchangeError::encoding(format!(
            "address {} must be 20 bytes, got {}",
            address,
            raw.len()
        ))
    })
}
