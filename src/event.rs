//! Release notification payload parsing.
//!
//! Only `resource.release.name` and `resource.release.description` are read;
//! everything else in the payload is ignored. Missing or non-string values
//! become empty strings.
use log::*;
use serde::Deserialize;
use serde_json::Value;

use crate::{Result, error::ReleaseNotesError};

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    resource: Option<Resource>,
}

#[derive(Debug, Default, Deserialize)]
struct Resource {
    #[serde(default)]
    release: Option<Release>,
}

#[derive(Debug, Default, Deserialize)]
struct Release {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
}

/// Release name and description extracted from a notification.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub name: String,
    pub description: String,
}

impl ReleaseEvent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Parse a raw request body. An empty (or whitespace only) body yields an
    /// empty event; a body that is not JSON is an error.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            warn!("received empty release payload");
            return Ok(Self::from_value(&Value::Null));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ReleaseNotesError::InvalidPayload(e.to_string()))?;

        Ok(Self::from_value(&value))
    }

    /// Extract the release fields from an already decoded payload.
    pub fn from_value(value: &Value) -> Self {
        // a payload that isn't an object (e.g. `null` or an array) carries no
        // release information
        let payload = Payload::deserialize(value).unwrap_or_default();

        let release = payload.resource.and_then(|r| r.release);

        let (name, description) = match release {
            Some(release) => (
                string_field(release.name, "resource.release.name"),
                string_field(
                    release.description,
                    "resource.release.description",
                ),
            ),
            None => {
                warn!("payload has no resource.release object");
                (String::new(), String::new())
            }
        };

        Self { name, description }
    }
}

fn string_field(value: Option<Value>, path: &str) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => {
            warn!("payload is missing {path}: using empty string");
            String::new()
        }
        Some(other) => {
            warn!("payload field {path} is not a string ({other}): ignoring");
            String::new()
        }
    }
}
