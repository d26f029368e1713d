//! Fixed-point token amount conversion and display helpers.

use num_bigint::BigUint;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("too many decimal places: {places} (token has {decimals})")]
    TooManyDecimals { places: usize, decimals: u8 },

    #[error("invalid hex quantity: {0}")]
    InvalidQuantity(String),
}

/// Render a raw integer amount with `decimals` decimal places, trimming
/// trailing zeros. Zero renders as `0.0` when `decimals > 0`.
pub fn format_units(amount: &BigUint, decimals: u8) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return s;
    }

    if s.len() <= decimals {
        let zeros = decimals - s.len();
        let mut result = String::from("0.");
        result.extend(std::iter::repeat_n('0', zeros));
        result.push_str(&s);
        let trimmed = result.trim_end_matches('0');
        if trimmed.ends_with('.') {
            return format!("{trimmed}0");
        }
        return trimmed.to_string();
    }

    let (integer_part, decimal_part) = s.split_at(s.len() - decimals);
    let trimmed = decimal_part.trim_end_matches('0');
    if trimmed.is_empty() {
        integer_part.to_string()
    } else {
        format!("{integer_part}.{trimmed}")
    }
}

/// Display an amount with at most `max_fraction_digits` fractional digits
/// (truncated, not rounded). Zero renders as `"0"`.
pub fn format_token(amount: &BigUint, decimals: u8, max_fraction_digits: usize) -> String {
    let full = format_units(amount, decimals);
    let Some((int_part, frac_part)) = full.split_once('.') else {
        return full;
    };
    let cut = &frac_part[..frac_part.len().min(max_fraction_digits)];
    let cut = cut.trim_end_matches('0');
    if cut.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{cut}")
    }
}

/// Parse a human-entered decimal amount (e.g. `"1.5"`) into a raw integer
/// with `decimals` places.
pub fn parse_units(input: &str, decimals: u8) -> Result<BigUint, UnitsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (int_part, frac_part) = match input.split_once('.') {
        Some((i, f)) => (i, f),
        None => (input, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(UnitsError::Invalid(input.to_string()));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(UnitsError::Invalid(input.to_string()));
    }
    if frac_part.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            places: frac_part.len(),
            decimals,
        });
    }

    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    digits.extend(std::iter::repeat_n('0', decimals as usize - frac_part.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| UnitsError::Invalid(input.to_string()))
}

/// `0x1234...abcd` style abbreviation; `"-"` for an empty value.
pub fn short_address(value: &str) -> String {
    if value.is_empty() {
        return "-".to_string();
    }
    if value.len() <= 10 {
        return value.to_string();
    }
    format!("{}...{}", &value[..6], &value[value.len() - 4..])
}

/// Parse a JSON-RPC hex quantity (`"0x1a"`) into a big integer.
pub fn parse_quantity(value: &str) -> Result<BigUint, UnitsError> {
    let body = value
        .strip_prefix("0x")
        .ok_or_else(|| UnitsError::InvalidQuantity(value.to_string()))?;
    if body.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(body.as_bytes(), 16)
        .ok_or_else(|| UnitsError::InvalidQuantity(value.to_string()))
}

/// Parse a JSON-RPC hex quantity that must fit in a `u64` (chain ids, block
/// numbers).
pub fn parse_quantity_u64(value: &str) -> Result<u64, UnitsError> {
    let body = value
        .strip_prefix("0x")
        .ok_or_else(|| UnitsError::InvalidQuantity(value.to_string()))?;
    u64::from_str_radix(body, 16).map_err(|_| UnitsError::InvalidQuantity(value.to_string()))
}

/// Encode a big integer as a JSON-RPC hex quantity.
pub fn to_quantity(value: &BigUint) -> String {
    format!("0x{}", value.to_str_radix(16))
}
