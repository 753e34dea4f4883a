//! Built-in reversible obfuscators.
//!
//! Obfuscation is encoding, not encryption; it keeps declared fields
//! unreadable at rest and in transit to the backend. Both built-ins act on
//! string values and pass every other value through unchanged, so nullable
//! obfuscated fields stay null.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::traits::{Obfuscator, ObfuscatorProvider};

/// Base64 obfuscator for string values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64Obfuscator;

impl Obfuscator for Base64Obfuscator {
    fn obfuscate(&self, value: &Value) -> CoreResult<Value> {
        match value {
            Value::String(text) => Ok(Value::String(STANDARD.encode(text.as_bytes()))),
            other => Ok(other.clone()),
        }
    }

    fn deobfuscate(&self, value: &Value) -> CoreResult<Value> {
        match value {
            Value::String(text) => {
                let bytes = STANDARD
                    .decode(text.as_bytes())
                    .map_err(|err| CoreError::validation(format!("base64 decode: {err}")))?;
                let plain = String::from_utf8(bytes)
                    .map_err(|err| CoreError::validation(format!("base64 decode: {err}")))?;
                Ok(Value::String(plain))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Provider registering [`Base64Obfuscator`] under the name `base64`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64ObfuscatorProvider;

impl ObfuscatorProvider for Base64ObfuscatorProvider {
    fn name(&self) -> &str {
        "base64"
    }

    fn open(&self) -> Arc<dyn Obfuscator> {
        Arc::new(Base64Obfuscator)
    }
}

/// Hex obfuscator for string values.
#[derive(Clone, Copy, Debug, Default)]
pub struct HexObfuscator;

impl Obfuscator for HexObfuscator {
    fn obfuscate(&self, value: &Value) -> CoreResult<Value> {
        match value {
            Value::String(text) => Ok(Value::String(hex::encode(text.as_bytes()))),
            other => Ok(other.clone()),
        }
    }

    fn deobfuscate(&self, value: &Value) -> CoreResult<Value> {
        match value {
            Value::String(text) => {
                let bytes = hex::decode(text.as_bytes())
                    .map_err(|err| CoreError::validation(format!("hex decode: {err}")))?;
                let plain = String::from_utf8(bytes)
                    .map_err(|err| CoreError::validation(format!("hex decode: {err}")))?;
                Ok(Value::String(plain))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Provider registering [`HexObfuscator`] under the name `hex`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HexObfuscatorProvider;

impl ObfuscatorProvider for HexObfuscatorProvider {
    fn name(&self) -> &str {
        "hex"
    }

    fn open(&self) -> Arc<dyn Obfuscator> {
        Arc::new(HexObfuscator)
    }
}
