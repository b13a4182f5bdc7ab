// Native-currency and USD unit helpers (18-decimal fixed point)

use thiserror::Error;

/// One whole unit of native currency in wei
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

const DECIMALS: usize = 18;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Amount cannot be empty")]
    Empty,

    #[error("Invalid digit in amount: {0}")]
    InvalidDigit(String),

    #[error("Too many fraction digits: at most {max}, got {got}")]
    TooPrecise { max: usize, got: usize },

    #[error("Amount overflows")]
    Overflow,
}

/// Parse a decimal ether string such as `"0.3"` into wei
pub fn parse_ether(s: &str) -> Result<u128, UnitsError> {
    let s = s.trim();
    if s.is_empty() || s == "." {
        return Err(UnitsError::Empty);
    }

    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if fraction.len() > DECIMALS {
        return Err(UnitsError::TooPrecise {
            max: DECIMALS,
            got: fraction.len(),
        });
    }

    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(UnitsError::InvalidDigit(s.to_string()));
    }

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| UnitsError::Overflow)?
            .checked_mul(WEI_PER_ETHER)
            .ok_or(UnitsError::Overflow)?
    };

    let fraction_wei = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = DECIMALS);
        padded.parse::<u128>().map_err(|_| UnitsError::Overflow)?
    };

    whole_wei.checked_add(fraction_wei).ok_or(UnitsError::Overflow)
}

/// Format wei as a decimal ether string without trailing zeros
pub fn format_ether(wei: u128) -> String {
    format_fixed(wei)
}

/// Format an 18-decimal USD value, e.g. `"50"` or `"2000.5"`
pub fn format_usd(usd: u128) -> String {
    format_fixed(usd)
}

fn format_fixed(value: u128) -> String {
    let whole = value / WEI_PER_ETHER;
    let fraction = value % WEI_PER_ETHER;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
