use alloy_primitives::utils::{ParseUnits, format_units, parse_units};
use alloy_primitives::{Address, B256, U256};
use anyhow::{Result, anyhow, bail};

pub const MAX_MEMO_BYTES: usize = 32;

/// Scales a decimal string to base units, e.g. `10.5` at 6 decimals is
/// `10500000`.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        bail!("amount is required");
    }
    match parse_units(amount, decimals).map_err(|err| anyhow!("invalid amount {amount}: {err}"))? {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => bail!("amount must not be negative"),
    }
}

pub fn format_amount(value: U256, decimals: u8) -> Result<String> {
    format_units(value, decimals).map_err(|err| anyhow!("cannot format amount: {err}"))
}

/// Rounds a formatted decimal string for display.
pub fn display_amount(formatted: &str, places: usize) -> String {
    match formatted.parse::<f64>() {
        Ok(value) => format!("{value:.places$}"),
        Err(_) => formatted.to_owned(),
    }
}

pub fn to_u128(value: U256) -> Result<u128> {
    u128::try_from(value).map_err(|_| anyhow!("amount exceeds uint128"))
}

/// Right-pads the UTF-8 bytes of `memo` into a `bytes32`.
pub fn encode_memo(memo: &str) -> Result<B256> {
    let bytes = memo.as_bytes();
    if bytes.len() > MAX_MEMO_BYTES {
        bail!(
            "memo is {} bytes, at most {MAX_MEMO_BYTES} are allowed",
            bytes.len()
        );
    }
    Ok(B256::right_padding_from(bytes))
}

/// Parses a hex address. Mixed-case input must carry a valid EIP-55
/// checksum.
pub fn parse_address(input: &str) -> Result<Address> {
    let input = input.trim();
    let digits = input.strip_prefix("0x").unwrap_or(input);
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());

    if has_upper && has_lower {
        Address::parse_checksummed(input, None).map_err(|err| anyhow!("invalid address {input}: {err}"))
    } else {
        input
            .parse::<Address>()
            .map_err(|err| anyhow!("invalid address {input}: {err}"))
    }
}
