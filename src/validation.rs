use crate::blockchain::polling::BackfillTarget;
use crate::models::Network;
use base64::Engine;
use thiserror::Error;

/// Upper bound on heights accepted in a single backfill request.
pub const MAX_BACKFILL_SPAN: u64 = 100_000;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown network: {0}. Must be 'mainnet' or 'testnet'")]
    InvalidNetwork(String),

    #[error("Invalid height for {name}: {value}")]
    InvalidHeight { name: String, value: String },

    #[error("Invalid height range: {from} > {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub fn validate_network(network: &str) -> Result<Network, ValidationError> {
    if network.trim().is_empty() {
        return Err(ValidationError::MissingParameter("network".to_string()));
    }
    network
        .trim()
        .parse()
        .map_err(ValidationError::InvalidNetwork)
}

pub fn validate_height(name: &str, value: &str) -> Result<u64, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingParameter(name.to_string()));
    }
    match value.trim().parse::<u64>() {
        Ok(height) if height > 0 => Ok(height),
        _ => Err(ValidationError::InvalidHeight {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// `to` absent means "up to the finalized tip".
pub fn validate_backfill_range(
    from: &str,
    to: Option<&str>,
) -> Result<(u64, BackfillTarget), ValidationError> {
    let from = validate_height("from", from)?;
    let Some(to) = to.filter(|t| !t.trim().is_empty()) else {
        return Ok((from, BackfillTarget::Latest));
    };
    let to = validate_height("to", to)?;

    if from > to {
        return Err(ValidationError::InvalidRange { from, to });
    }
    if to - from >= MAX_BACKFILL_SPAN {
        return Err(ValidationError::InvalidParameter(format!(
            "range spans more than {} heights",
            MAX_BACKFILL_SPAN
        )));
    }
    Ok((from, BackfillTarget::Height(to)))
}

/// Transaction hashes are 32 bytes of hex; stored uppercase.
pub fn validate_tx_hash(hash: &str) -> Result<String, ValidationError> {
    let hash = hash.trim().trim_start_matches("0x");
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidHash(hash.to_string()));
    }
    Ok(hash.to_uppercase())
}

/// Raw envelope bytes from either hex (optionally `0x`-prefixed) or base64.
pub fn parse_envelope_input(input: &str) -> Result<Vec<u8>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::MissingParameter("transaction".to_string()));
    }

    let hex_body = input.strip_prefix("0x").unwrap_or(input);
    let looks_hex = hex_body.len() % 2 == 0 && hex_body.chars().all(|c| c.is_ascii_hexdigit());
    if input.starts_with("0x") || looks_hex {
        return hex::decode(hex_body)
            .map_err(|e| ValidationError::InvalidParameter(format!("bad hex: {}", e)));
    }

    base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|e| ValidationError::InvalidParameter(format!("bad base64: {}", e)))
}
