use chrono::{FixedOffset, Local, NaiveDateTime, Utc};
use std::sync::Arc;

/// Source of "now" for stamping activation records.
pub trait Clock: Send + Sync {
    /// Wall-clock date and time in the zone activation records are recorded in.
    fn now(&self) -> NaiveDateTime;
}

pub type ClockState = Arc<dyn Clock>;

/// Process clock, either in the host's local zone or a configured fixed offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    pub fn new(offset: Option<FixedOffset>) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}
