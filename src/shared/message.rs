/**
 * Chat Message Data Structure
 *
 * This module defines the ChatMessage struct exchanged over the realtime
 * chat socket and persisted by the message store.
 *
 * The same JSON shape is used for inbound frames, outbound broadcast frames,
 * the REST send path and history responses:
 *
 * ```json
 * {"id":7,"sender_id":1,"recipient_id":2,"message":"hi","is_group":false,"created_at":"2024-01-01T00:00:00Z"}
 * ```
 *
 * `group_id` is omitted when zero and `id` is omitted until the store has
 * assigned one.
 */
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::shared::error::SharedError;

/// A single chat message, direct or group.
///
/// The value is never mutated in place once it has been handed to the
/// store or the broadcast channel; the session builds the final value with
/// [`ChatMessage::authored_by`] and passes copies onward.
///
/// # Fields
/// * `id` - Store-assigned row id, absent before persistence
/// * `sender_id` - Authenticated owner of the connection that sent it
/// * `recipient_id` - Target user for direct messages
/// * `group_id` - Target group, zero when not a group message
/// * `message` - Free-form body (empty bodies are accepted)
/// * `is_group` - Whether `group_id` should be consulted
/// * `created_at` - Receipt time unless the client supplied one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipient_id: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub group_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Treat an explicit `null` the same as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tagged view of where a message is going.
///
/// The wire model carries both `recipient_id` and `group_id`; `is_group`
/// decides which one is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Direct { recipient_id: i64 },
    Group { group_id: i64 },
}

/// Filter for the history query: the direct conversation between
/// `user_id` and `recipient_id` in both directions, plus the group
/// conversation `group_id` when non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user_id: i64,
    pub recipient_id: i64,
    pub group_id: i64,
}

impl ChatMessage {
    /// Create a direct message to `recipient_id`.
    pub fn direct(recipient_id: i64, body: impl Into<String>) -> Self {
        Self {
            recipient_id,
            message: body.into(),
            ..Self::default()
        }
    }

    /// Create a message to the group `group_id`.
    pub fn group(group_id: i64, body: impl Into<String>) -> Self {
        Self {
            group_id,
            message: body.into(),
            is_group: true,
            ..Self::default()
        }
    }

    /// Decode one inbound text frame.
    ///
    /// A decode failure means the payload is malformed; it says nothing
    /// about the health of the transport that delivered it.
    pub fn from_frame(frame: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Encode as an outbound text frame.
    pub fn to_frame(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Produce the server-side copy of a client-submitted message.
    ///
    /// `sender_id` is always replaced with the authenticated identity and any
    /// client-supplied `id` is dropped. `created_at` is set to `now` when the
    /// client left it unset (or sent the zero time), otherwise the client
    /// value is kept unchanged.
    pub fn authored_by(self, sender_id: i64, now: DateTime<Utc>) -> Self {
        let created_at = match self.created_at {
            Some(ts) if !is_zero_time(&ts) => ts,
            _ => now,
        };
        Self {
            id: None,
            sender_id,
            created_at: Some(created_at),
            ..self
        }
    }

    /// Copy of this message carrying the store-assigned id.
    pub fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }

    pub fn target(&self) -> MessageTarget {
        if self.is_group {
            MessageTarget::Group { group_id: self.group_id }
        } else {
            MessageTarget::Direct { recipient_id: self.recipient_id }
        }
    }

    /// Reject messages whose target cannot be resolved.
    ///
    /// Used by the REST send path; the realtime path relays whatever it
    /// receives.
    pub fn validate(&self) -> Result<(), SharedError> {
        match self.target() {
            MessageTarget::Group { group_id } if group_id <= 0 => Err(SharedError::validation(
                "group_id",
                "group messages need a positive group_id",
            )),
            MessageTarget::Direct { recipient_id } if recipient_id <= 0 => Err(
                SharedError::validation("recipient_id", "direct messages need a positive recipient_id"),
            ),
            _ => Ok(()),
        }
    }
}

/// Some clients send `0001-01-01T00:00:00Z` for an unset timestamp.
fn is_zero_time(ts: &DateTime<Utc>) -> bool {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single() == Some(*ts)
}
