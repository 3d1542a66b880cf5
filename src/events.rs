//! Typed events of the badge-read pipeline and the pure planner that turns a
//! read into the effects the handler must perform.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::models::{NewActivationRecord, User};

/// TagReadEvent
///
/// A raw identifier read from a badge by reader hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TagReadEvent {
    #[serde(rename = "tagRFID")]
    #[schema(example = "A1B2")]
    pub tag_rfid: String,
}

impl TagReadEvent {
    pub fn new(tag_rfid: impl Into<String>) -> Self {
        Self {
            tag_rfid: tag_rfid.into(),
        }
    }
}

/// Signal to grant physical access. Its presence is the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnlockEvent;

/// Side effect requested by [`plan_tag_read`], executed in order by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagReadEffect {
    RecordActivation(NewActivationRecord),
    Unlock(UnlockEvent),
}

/// plan_tag_read
///
/// Decides what a tag read should cause, given the user it resolved to (if any)
/// and the current wall-clock instant.
///
/// An unmatched read plans nothing. A matched read plans one activation record
/// stamped with `now` (second precision) followed by one unlock. The user's
/// enabled flag is not consulted: disabled accounts keep physical access.
pub fn plan_tag_read(
    _event: &TagReadEvent,
    matched: Option<&User>,
    now: NaiveDateTime,
) -> Vec<TagReadEffect> {
    let Some(user) = matched else {
        return Vec::new();
    };

    let time = now.time().with_nanosecond(0).unwrap_or(now.time());
    vec![
        TagReadEffect::RecordActivation(NewActivationRecord {
            user_id: user.id,
            date: now.date(),
            time,
        }),
        TagReadEffect::Unlock(UnlockEvent),
    ]
}
