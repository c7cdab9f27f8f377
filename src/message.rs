//! Message records and the references used to address them.

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

use crate::avatar::avatar_color;

/// Stable message identifier, server-assigned or client-generated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

/// Numeric ids are accepted too. The frame codec carries every JSON number as
/// a float, so `1.0` reads back as `"1"`.
impl<'de> Deserialize<'de> for MessageId {
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Int(n) => Self(n.to_string()),
            Raw::Float(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Self((n as i64).to_string()),
            Raw::Float(n) => Self(n.to_string()),
        })
    }
}

impl MessageId {
    /// Fresh client-generated id (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locates one record in the log for mutation.
///
/// `Id` is the mutation key. `Index` only exists for records that arrived
/// without an id; positions shift under concurrent deletes, so it is
/// best-effort.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    Id(MessageId),
    Index(usize),
}

impl From<MessageId> for Reference {
    fn from(id: MessageId) -> Self {
        Self::Id(id)
    }
}

impl From<usize> for Reference {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Index(index) => write!(f, "index:{index}"),
        }
    }
}

/// One chat entry.
///
/// `sender`, `avatar_color` and `sent_at` are fixed at creation; only `text`
/// changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub sender: String,
    pub text: String,
    pub avatar_color: String,
    pub sent_at: String,
}

impl MessageRecord {
    /// New record stamped with a client-generated id, the sender's avatar
    /// color and the current local time.
    #[must_use]
    pub fn compose(sender: &str, text: &str) -> Self {
        Self {
            id: Some(MessageId::generate()),
            sender: sender.to_owned(),
            text: text.to_owned(),
            avatar_color: avatar_color(sender).to_owned(),
            sent_at: format_sent_at(now_local()),
        }
    }

    /// Whether the record was written by `display_name`.
    #[must_use]
    pub fn is_from(&self, display_name: &str) -> bool {
        self.sender == display_name
    }
}

/// Accepts the current field names plus the `avatarColor`/`time` keys older
/// backends still send, and derives a missing color from the sender.
impl<'de> Deserialize<'de> for MessageRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            id: Option<MessageId>,
            sender: String,
            text: String,
            #[serde(default, alias = "avatarColor")]
            avatar_color: Option<String>,
            #[serde(default, alias = "time")]
            sent_at: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let avatar_color = raw
            .avatar_color
            .filter(|color| !color.is_empty())
            .unwrap_or_else(|| avatar_color(&raw.sender).to_owned());
        Ok(Self {
            id: raw.id.filter(|id| !id.as_str().is_empty()),
            sender: raw.sender,
            text: raw.text,
            avatar_color,
            sent_at: raw.sent_at.unwrap_or_default(),
        })
    }
}

/// `HH:MM` display time.
#[must_use]
pub fn format_sent_at(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]"))
        .unwrap_or_default()
}

fn now_local() -> OffsetDateTime {
    // The local offset is unavailable on some platforms once threads exist.
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
