//! Entry envelope
//!
//! The persisted unit for one key: the caller's payload plus its expiry.
//!
//! ## Wire Format
//! ```text
//! {"value": <any JSON>, "timeOut": <epoch millis, 0 = never>}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::expiry::{self, NEVER_EXPIRES};

/// Value plus absolute expiry instant, as stored under one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub value: Value,

    #[serde(rename = "timeOut")]
    pub expires_at: u64,
}

impl Envelope {
    pub fn new(value: Value, expires_at: u64) -> Self {
        Self { value, expires_at }
    }

    /// Serialize to the stored JSON text
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse stored JSON text.
    ///
    /// Only malformed JSON is an error. Data written by other code is read
    /// leniently: a missing `timeOut` means never-expires, a missing `value`
    /// becomes `null`, and any non-object document is a never-expiring
    /// envelope around `null`.
    pub fn decode(raw: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(raw)?;

        Ok(match document {
            Value::Object(mut fields) => Self {
                value: fields.remove("value").unwrap_or(Value::Null),
                expires_at: expiry_field(&fields),
            },
            _ => Self::new(Value::Null, NEVER_EXPIRES),
        })
    }

    pub fn is_live(&self, now_ms: u64) -> bool {
        expiry::is_live(self.expires_at, now_ms)
    }

    pub fn never_expires(&self) -> bool {
        self.expires_at == NEVER_EXPIRES
    }
}

/// Read `timeOut` from a foreign document.
///
/// A numeric zero or absent field is never-expires. Anything else below one,
/// including the text `"0"`, lands on `1`, an instant that is always past.
fn expiry_field(fields: &Map<String, Value>) -> u64 {
    let millis = match fields.get("timeOut") {
        None | Some(Value::Null) => return NEVER_EXPIRES,
        Some(Value::Number(n)) => match n.as_u64() {
            Some(ms) => return ms,
            None => n.as_f64(),
        },
        Some(Value::String(text)) => {
            // text is never the sentinel, even when it reads as zero
            return match text.trim().parse::<f64>() {
                Ok(ms) if ms >= 1.0 => ms as u64,
                _ => 1,
            };
        }
        Some(_) => None,
    };

    match millis {
        Some(ms) if ms == 0.0 => NEVER_EXPIRES,
        Some(ms) if ms >= 1.0 => ms as u64,
        _ => 1,
    }
}
