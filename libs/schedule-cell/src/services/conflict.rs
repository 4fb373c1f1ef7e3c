use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};

use shared_models::clinic::BusyInterval;
use shared_models::error::{ConflictDetail, SchedulingError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictOutcome {
    pub conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<ConflictDetail>,
}

/// Overlap test shared by booking, rescheduling, walk-in intake and the slot grid.
#[derive(Debug, Clone, Copy)]
pub struct ConflictChecker {
    buffer: Duration,
}

impl ConflictChecker {
    pub fn new(buffer: Duration) -> Self {
        Self { buffer }
    }

    /// First interval the candidate collides with.
    ///
    /// The candidate occupies `[start, start + duration + buffer)`; each
    /// blocker already carries its own buffer in `end`.
    pub fn first_blocking<'a>(
        &self,
        start: NaiveDateTime,
        duration_minutes: i32,
        busy: &'a [BusyInterval],
    ) -> Option<&'a BusyInterval> {
        let check_end = start + Duration::minutes(duration_minutes as i64) + self.buffer;
        busy.iter()
            .find(|blocker| start < blocker.end && check_end > blocker.start)
    }

    pub fn check(&self, start: NaiveDateTime, duration_minutes: i32, busy: &[BusyInterval]) -> ConflictOutcome {
        match self.first_blocking(start, duration_minutes, busy) {
            Some(blocker) => {
                debug!(
                    "Candidate {} ({} min) blocked by {} for doctor {}",
                    start, duration_minutes, blocker.reason(), blocker.doctor_id
                );
                ConflictOutcome {
                    conflict: true,
                    blocking: Some(ConflictDetail::from(blocker)),
                }
            }
            None => ConflictOutcome {
                conflict: false,
                blocking: None,
            },
        }
    }

    pub fn ensure_free(
        &self,
        start: NaiveDateTime,
        duration_minutes: i32,
        busy: &[BusyInterval],
    ) -> Result<(), SchedulingError> {
        match self.first_blocking(start, duration_minutes, busy) {
            Some(blocker) => {
                warn!("Rejecting {} for doctor {}: {}", start, blocker.doctor_id, blocker.reason());
                Err(SchedulingError::Conflict(ConflictDetail::from(blocker)))
            }
            None => Ok(()),
        }
    }
}
