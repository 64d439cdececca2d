//! Message encoders for [`PublishHandle::send_encoded`](crate::PublishHandle::send_encoded).

use bytes::Bytes;
use senderpool_core::Result;
use serde::Serialize;

/// Turns a value into a message payload.
///
/// Any `Fn(&T) -> Bytes` closure is an encoder.
pub trait MessageEncoder<T: ?Sized>: Send + Sync {
    /// Encode `value`.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`](senderpool_core::Error::Encoding) if the
    /// value cannot be represented.
    fn encode(&self, value: &T) -> Result<Bytes>;
}

impl<T, F> MessageEncoder<T> for F
where
    T: ?Sized,
    F: Fn(&T) -> Bytes + Send + Sync,
{
    fn encode(&self, value: &T) -> Result<Bytes> {
        Ok(self(value))
    }
}

/// Sends strings as their UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Encoder;

impl MessageEncoder<str> for Utf8Encoder {
    fn encode(&self, value: &str) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl MessageEncoder<String> for Utf8Encoder {
    fn encode(&self, value: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// Serializes values as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl<T: Serialize + ?Sized> MessageEncoder<T> for JsonEncoder {
    fn encode(&self, value: &T) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}
