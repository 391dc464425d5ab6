//! Encoding of JSON payloads carried by durable promises.
//!
//! The promise store treats `data` as opaque base64 text. Everything this
//! workspace stores is JSON, so a resolved value of `"hello world"` travels
//! as `base64("\"hello world\"")`.

use base64::{Engine, engine::general_purpose::STANDARD};
use pledge_types::PromiseValue;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode raw bytes as promise data.
pub fn encode_data(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Serialize `value` to JSON and wrap it as a promise payload.
pub fn encode_json_payload<T: Serialize + ?Sized>(value: &T) -> Result<PromiseValue, PayloadError> {
    let json = serde_json::to_vec(value)?;
    Ok(PromiseValue {
        headers: None,
        data: Some(encode_data(&json)),
    })
}

/// Decode a promise payload produced by [`encode_json_payload`].
///
/// A payload without data decodes as JSON `null`, which lets `Option<T>` and
/// `()` targets accept empty completions.
pub fn decode_json_payload<T: DeserializeOwned>(value: &PromiseValue) -> Result<T, PayloadError> {
    match value.data.as_deref() {
        Some(data) if !data.is_empty() => {
            let bytes = STANDARD.decode(data)?;
            Ok(serde_json::from_slice(&bytes)?)
        }
        _ => Ok(serde_json::from_value(serde_json::Value::Null)?),
    }
}
