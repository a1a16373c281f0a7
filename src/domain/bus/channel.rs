//! Channel names.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Longest channel name accepted, in bytes.
pub const MAX_CHANNEL_NAME_LEN: usize = 128;

/// A validated channel path such as `inventory` or `orders/warehouse-7`.
///
/// Channels have no lifecycle of their own; a name is all there is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Validates and wraps a channel name.
    ///
    /// Surrounding whitespace is trimmed. Allowed characters are ASCII
    /// alphanumerics and `_ - . : /`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ValidationError::empty_field("channel"));
        }
        if name.len() > MAX_CHANNEL_NAME_LEN {
            return Err(ValidationError::too_long("channel", MAX_CHANNEL_NAME_LEN));
        }
        if let Some(bad) = name.chars().find(|c| !is_channel_char(*c)) {
            return Err(ValidationError::invalid_format(
                "channel",
                format!("illegal character '{}'", bad),
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_channel_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/')
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ChannelName::parse(&raw).map_err(serde::de::Error::custom)
    }
}
