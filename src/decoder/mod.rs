//! Cosmos transaction envelope decoder.
//!
//! `decode` parses the outer `TxRaw` frame (body, auth info, signatures) and
//! dispatches each contained `Any` through the static registry. The outer
//! frame is all-or-nothing; individual messages degrade to
//! [`MessageKind::Unknown`] instead of failing the transaction.

pub mod message;
pub mod normalize;
pub mod proto;
pub mod registry;

use crate::models::{Coin, Fee};
use base64::Engine;
use prost::Message;
use serde::Serialize;
use thiserror::Error;

pub use message::{decode_any, DecodedMessage};
pub use registry::MessageKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Invalid transaction encoding: {0}")]
    Encoding(String),

    #[error("Invalid tx envelope: {0}")]
    Envelope(prost::DecodeError),

    #[error("Invalid tx body: {0}")]
    Body(prost::DecodeError),

    #[error("Invalid auth info: {0}")]
    AuthInfo(prost::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignerSummary {
    pub public_key_type: Option<String>,
    pub public_key: Option<String>,
    pub sequence: u64,
}

/// Outer frame of a transaction, without its messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeSummary {
    pub memo: String,
    pub timeout_height: u64,
    pub fee: Fee,
    pub signers: Vec<SignerSummary>,
    pub signature_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeResult {
    pub envelope: Option<EnvelopeSummary>,
    pub messages: Vec<DecodedMessage>,
    #[serde(skip)]
    pub error: Option<DecodeError>,
}

impl DecodeResult {
    fn failed(err: DecodeError) -> Self {
        Self {
            envelope: None,
            messages: Vec::new(),
            error: Some(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Type url of the first message, used as the transaction's primary type.
    pub fn primary_type(&self) -> Option<&str> {
        self.messages.first().map(|m| m.type_url.as_str())
    }
}

/// Decodes raw envelope bytes.
pub fn decode(bytes: &[u8]) -> DecodeResult {
    match decode_envelope(bytes) {
        Ok((envelope, anys)) => DecodeResult {
            envelope: Some(envelope),
            messages: anys.iter().map(decode_any).collect(),
            error: None,
        },
        Err(e) => DecodeResult::failed(e),
    }
}

/// Decodes a base64 envelope as returned by the RPC `tx` and `tx_search` endpoints.
pub fn decode_base64(encoded: &str) -> DecodeResult {
    match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
        Ok(bytes) => decode(&bytes),
        Err(e) => DecodeResult::failed(DecodeError::Encoding(e.to_string())),
    }
}

fn decode_envelope(bytes: &[u8]) -> Result<(EnvelopeSummary, Vec<proto::Any>), DecodeError> {
    let raw = proto::TxRaw::decode(bytes).map_err(DecodeError::Envelope)?;
    let body = proto::TxBody::decode(raw.body_bytes.as_slice()).map_err(DecodeError::Body)?;
    let auth = proto::AuthInfo::decode(raw.auth_info_bytes.as_slice())
        .map_err(DecodeError::AuthInfo)?;

    let fee = auth
        .fee
        .map(|f| Fee {
            amount: f
                .amount
                .into_iter()
                .map(|c| Coin { denom: c.denom, amount: c.amount })
                .collect(),
            gas_limit: f.gas_limit,
        })
        .unwrap_or_default();

    let signers = auth
        .signer_infos
        .iter()
        .map(|s| {
            let public_key = s.public_key.as_ref().map(|pk| {
                proto::PubKey::decode(pk.value.as_slice())
                    .map(|k| hex::encode(k.key))
                    .unwrap_or_else(|_| hex::encode(&pk.value))
            });
            SignerSummary {
                public_key_type: s.public_key.as_ref().map(|pk| pk.type_url.clone()),
                public_key,
                sequence: s.sequence,
            }
        })
        .collect();

    let envelope = EnvelopeSummary {
        memo: body.memo,
        timeout_height: body.timeout_height,
        fee,
        signers,
        signature_count: raw.signatures.len(),
    };
    Ok((envelope, body.messages))
}
