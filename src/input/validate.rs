//! Raw configuration bag -> `ConfigInput`.

use serde_json::{Map, Value};

use super::image::is_valid_image_reference;
use super::quantity::{MemoryQuantity, QuantityParseError};
use super::ConfigInput;
use crate::error::ValidationError;

/// Untyped configuration bag as produced by a configuration source.
pub type RawConfig = Map<String, Value>;

/// Raw key names.
pub mod keys {
    /// Container image reference.
    pub const IMAGE_URL: &str = "imageUrl";
    /// Container port.
    pub const CONTAINER_PORT: &str = "containerPort";
    /// CPU limit.
    pub const CPU: &str = "cpu";
    /// Memory limit.
    pub const MEMORY: &str = "memory";
    /// Request concurrency.
    pub const CONCURRENCY: &str = "concurrency";
    /// Served message.
    pub const MESSAGE: &str = "message";
    /// Deployment region.
    pub const LOCATION: &str = "location";
    /// Cloud project.
    pub const PROJECT: &str = "project";
    /// Public access toggle.
    pub const ALLOW_UNAUTHENTICATED: &str = "allowUnauthenticated";
}

const MAX_PORT: i64 = 65_535;
const MAX_CPU: i64 = 32;
const MAX_CONCURRENCY: i64 = 1_000;
const MAX_MEMORY: MemoryQuantity = MemoryQuantity {
    amount: 32,
    unit: super::MemoryUnit::Gi,
};

/// Validate a raw configuration bag, applying defaults to absent optional fields.
pub fn validate(raw: &RawConfig) -> Result<ConfigInput, ValidationError> {
    let location = required_string(raw, keys::LOCATION)?;
    let project = required_string(raw, keys::PROJECT)?;
    let image_url = required_string(raw, keys::IMAGE_URL)?;

    if !is_valid_image_reference(&image_url) {
        return Err(ValidationError::InvalidImageReference { value: image_url });
    }

    let container_port = bounded_int(
        raw,
        keys::CONTAINER_PORT,
        i64::from(ConfigInput::DEFAULT_PORT),
        MAX_PORT,
    )? as u16;
    let cpu = bounded_int(raw, keys::CPU, i64::from(ConfigInput::DEFAULT_CPU), MAX_CPU)? as u32;
    let concurrency = bounded_int(
        raw,
        keys::CONCURRENCY,
        i64::from(ConfigInput::DEFAULT_CONCURRENCY),
        MAX_CONCURRENCY,
    )? as u32;

    let memory = match optional_string(raw, keys::MEMORY)? {
        Some(value) => parse_memory(&value)?,
        None => MemoryQuantity::DEFAULT,
    };

    let message = optional_string(raw, keys::MESSAGE)?
        .unwrap_or_else(|| ConfigInput::DEFAULT_MESSAGE.to_string());

    let allow_unauthenticated = optional_bool(raw, keys::ALLOW_UNAUTHENTICATED)?.unwrap_or(true);

    Ok(ConfigInput {
        image_url,
        container_port,
        cpu,
        memory,
        concurrency,
        message,
        location,
        project,
        allow_unauthenticated,
    })
}

fn present<'a>(raw: &'a RawConfig, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|v| !v.is_null())
}

fn required_string(raw: &RawConfig, key: &str) -> Result<String, ValidationError> {
    match optional_string(raw, key)? {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ValidationError::MissingRequiredField {
            field: key.to_string(),
        }),
    }
}

fn optional_string(raw: &RawConfig, key: &str) -> Result<Option<String>, ValidationError> {
    match present(raw, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::InvalidType {
            field: key.to_string(),
            expected: "a string",
        }),
    }
}

fn optional_bool(raw: &RawConfig, key: &str) -> Result<Option<bool>, ValidationError> {
    let invalid = || ValidationError::InvalidType {
        field: key.to_string(),
        expected: "a boolean",
    };
    match present(raw, key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(invalid()),
        },
        Some(_) => Err(invalid()),
    }
}

/// Read an integer field in `1..=max`, falling back to `default` when absent.
fn bounded_int(raw: &RawConfig, key: &str, default: i64, max: i64) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidType {
        field: key.to_string(),
        expected: "an integer",
    };
    let out_of_range = |value: String| ValidationError::OutOfRangeValue {
        field: key.to_string(),
        value,
        allowed: format!("1..={max}"),
    };

    let value = match present(raw, key) {
        None => return Ok(default),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64()) {
            (Some(v), _) => v,
            // Larger than i64::MAX.
            (None, Some(v)) => return Err(out_of_range(v.to_string())),
            (None, None) => return Err(invalid()),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => v,
                Err(_) if is_integer_literal(s) => return Err(out_of_range(s.to_string())),
                Err(_) => return Err(invalid()),
            }
        }
        Some(_) => return Err(invalid()),
    };

    if !(1..=max).contains(&value) {
        return Err(out_of_range(value.to_string()));
    }
    Ok(value)
}

/// Optional sign followed by at least one digit.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_memory(value: &str) -> Result<MemoryQuantity, ValidationError> {
    let out_of_range = || ValidationError::OutOfRangeValue {
        field: keys::MEMORY.to_string(),
        value: value.to_string(),
        allowed: format!("1Ki..={MAX_MEMORY}"),
    };

    let quantity = match value.parse::<MemoryQuantity>() {
        Ok(q) => q,
        Err(QuantityParseError::Overflow) => return Err(out_of_range()),
        Err(QuantityParseError::Malformed) => {
            return Err(ValidationError::MalformedQuantity {
                field: keys::MEMORY.to_string(),
                value: value.to_string(),
            })
        }
    };

    match quantity.bytes() {
        Some(bytes) if bytes > 0 && Some(bytes) <= MAX_MEMORY.bytes() => Ok(quantity),
        _ => Err(out_of_range()),
    }
}
