//! Submission of case records to the DECIPHER patient registry.

use std::fmt;

pub mod api;
pub mod conf;
pub mod submit;
pub mod variants;

/// Identifier of a registry resource (patient or person).
///
/// The registry hands out numeric identifiers but may also use strings; ids that are the
/// canonical form of a number are written back as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        RemoteId(value.to_string())
    }
}

impl serde::Serialize for RemoteId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0.parse::<u64>() {
            Ok(number) if number.to_string() == self.0 => serializer.serialize_u64(number),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> serde::Deserialize<'de> for RemoteId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(number) => RemoteId(number.to_string()),
            Raw::Text(text) => RemoteId(text),
        })
    }
}
