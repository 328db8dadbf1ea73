//! Tool handlers. Each takes validated arguments and returns a
//! serializable result or a [`ToolError`](crate::error::ToolError).

pub mod catalog;
pub mod generate;
pub mod upscale;

use std::fmt::Display;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;

/// One image written by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Where the image was saved.
    pub path: String,
    /// Public URL, when upload is configured and succeeded.
    pub url: Option<String>,
    /// Generation parameters reported by the WebUI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
}

/// JSON Schema `integer` also admits `20.0`; accept any number without a
/// fractional part.
fn number_to_int<T>(number: &Number) -> Result<T, String>
where
    T: TryFrom<i64>,
    T::Error: Display,
{
    let value = match number.as_i64() {
        Some(v) => v,
        None => match number.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => f as i64,
            _ => return Err(format!("expected an integer, got {}", number)),
        },
    };
    T::try_from(value).map_err(|e| format!("integer {} out of range: {}", value, e))
}

pub(crate) fn integral<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
    T::Error: Display,
{
    let number = Number::deserialize(deserializer)?;
    number_to_int(&number).map_err(D::Error::custom)
}

pub(crate) fn integral_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
    T::Error: Display,
{
    match Option::<Number>::deserialize(deserializer)? {
        Some(number) => number_to_int(&number).map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}
