use super::normalize::normalize_json;
use super::proto::Any;
use super::registry::{self, Decoder, MessageKind, MessageSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Deepest `Any` nesting (authz exec, proposals) decoded against a schema.
pub const MAX_NESTING: usize = 16;

/// One message of a transaction, typed when its schema is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub type_url: String,
    pub kind: MessageKind,
    pub content: Value,
    /// JSON carried inside a contract call, when it parses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded_inline_payload: Option<Value>,
    /// Lowercase hex of the original bytes; only set for unknown messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DecodedMessage {
    pub fn unknown(type_url: &str, value: &[u8]) -> Self {
        let content = serde_json::from_slice::<Value>(value)
            .map(normalize_json)
            .unwrap_or(Value::Null);
        Self {
            type_url: type_url.to_string(),
            kind: MessageKind::Unknown,
            content,
            decoded_inline_payload: None,
            raw: Some(hex::encode(value)),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == MessageKind::Unknown
    }

    /// Converts into the serialized JSON shape without re-walking `content`.
    pub fn into_json(self) -> Value {
        let mut object = Map::new();
        object.insert("type_url".into(), Value::String(self.type_url));
        object.insert(
            "kind".into(),
            serde_json::to_value(self.kind).unwrap_or(Value::Null),
        );
        object.insert("content".into(), self.content);
        if let Some(inline) = self.decoded_inline_payload {
            object.insert("decoded_inline_payload".into(), inline);
        }
        if let Some(raw) = self.raw {
            object.insert("raw".into(), Value::String(raw));
        }
        Value::Object(object)
    }

    /// Original payload bytes of an unknown message.
    pub fn raw_bytes(&self) -> Option<Vec<u8>> {
        self.raw.as_deref().and_then(|h| hex::decode(h).ok())
    }
}

/// Decodes a single `Any`. Never fails: anything that cannot be decoded
/// against a schema comes back as an unknown message.
pub fn decode_any(any: &Any) -> DecodedMessage {
    decode_nested(any, 0)
}

/// Decodes an `Any` found `depth` levels inside another message. Past
/// [`MAX_NESTING`] the payload is kept raw.
pub(crate) fn decode_nested(any: &Any, depth: usize) -> DecodedMessage {
    if depth > MAX_NESTING {
        warn!("{} nested {} levels deep, keeping raw payload", any.type_url, depth);
        return DecodedMessage::unknown(&any.type_url, &any.value);
    }
    if let Some(spec) = registry::lookup_known(&any.type_url) {
        return decode_with(spec, any, depth);
    }
    if let Some(spec) = registry::lookup_namespace(&any.type_url) {
        debug!("Decoding {} through the namespace registry", any.type_url);
        return decode_with(spec, any, depth);
    }
    debug!("No schema for {}, keeping raw payload", any.type_url);
    DecodedMessage::unknown(&any.type_url, &any.value)
}

fn decode_with(spec: &MessageSpec, any: &Any, depth: usize) -> DecodedMessage {
    let result = match spec.decode {
        Decoder::Flat(decode) => decode(&any.value),
        Decoder::Nested(decode) => decode(&any.value, depth + 1),
    };
    match result {
        Ok(decoded) => DecodedMessage {
            type_url: any.type_url.clone(),
            kind: spec.kind,
            content: decoded.content,
            decoded_inline_payload: decoded.inline,
            raw: None,
        },
        Err(e) => {
            warn!("Malformed {} payload: {}", any.type_url, e);
            DecodedMessage::unknown(&any.type_url, &any.value)
        }
    }
}
