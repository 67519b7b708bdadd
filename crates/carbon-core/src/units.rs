// crates/carbon-core/src/units.rs
//
// Decimal measurement -> fixed-point token base units.
//
// The ledger token tracks balances in base units: 1 token = 10^decimals base
// units (18 for a standard ERC-20). The measurement is rounded to a whole
// token count first, then scaled with arbitrary-precision integers so no
// floating-point error can reach the base-unit level.

use num_bigint::BigUint;
use num_traits::{FromPrimitive, Zero};

use crate::address::Address;
use crate::error::CarbonError;
use crate::measurement::Measurement;
use crate::mint::MintRequest;

/// Precision of a standard ERC-20 token.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Largest bit length accepted by a `uint256` argument.
pub const UINT256_BITS: u64 = 256;

/// Round a measurement to the nearest whole unit, ties away from zero.
///
/// Returns `NonPositiveQuantity` when the result is zero or negative and
/// `InvalidResponse` for NaN or infinite input.
pub fn round_units(units: f64) -> Result<BigUint, CarbonError> {
    if !units.is_finite() {
        return Err(CarbonError::InvalidResponse(format!(
            "Measurement is not a finite number: {}",
            units
        )));
    }

    let rounded = units.round();
    if rounded <= 0.0 {
        return Err(CarbonError::NonPositiveQuantity { units });
    }

    // A finite, integral, positive f64 converts exactly.
    BigUint::from_f64(rounded).ok_or_else(|| {
        CarbonError::InvalidResponse(format!("Cannot represent {} as an integer", rounded))
    })
}

/// `10^decimals` as a big integer.
pub fn base_unit_factor(decimals: u8) -> BigUint {
    BigUint::from(10u32).pow(decimals as u32)
}

/// Scale a whole-unit count into base units, rejecting results wider than uint256.
pub fn scale_to_base_units(whole_units: &BigUint, decimals: u8) -> Result<BigUint, CarbonError> {
    let amount = whole_units * base_unit_factor(decimals);
    if amount.bits() > UINT256_BITS {
        return Err(CarbonError::AmountOutOfRange(format!(
            "{} units at {} decimals exceeds uint256",
            whole_units, decimals
        )));
    }
    Ok(amount)
}

/// Convert a measurement into a mint request for `recipient`.
///
/// Pure and deterministic: identical inputs always yield identical requests.
pub fn to_mint_request(
    measurement: &Measurement,
    recipient: Address,
    decimals: u8,
) -> Result<MintRequest, CarbonError> {
    let whole_units = round_units(measurement.simulated_units)?;
    let amount_base_units = scale_to_base_units(&whole_units, decimals)?;

    Ok(MintRequest {
        recipient,
        amount_base_units,
        system_identifier: measurement.system_identifier.clone(),
        whole_units,
        decimals,
    })
}

/// Render base units as a decimal token amount, trimming trailing zeros.
///
/// `format_units(1_500_000_000_000_000_000, 18)` is `"1.5"`.
pub fn format_units(amount: &BigUint, decimals: u8) -> String {
    let factor = base_unit_factor(decimals);
    let whole = amount / &factor;
    let frac = amount % &factor;

    if frac.is_zero() {
        return whole.to_str_radix(10);
    }

    let frac_str = format!("{:0>width$}", frac.to_str_radix(10), width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
