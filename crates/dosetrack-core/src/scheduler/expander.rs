//! Dose expander: turns a schedule into concrete, time-stamped occurrences.
//!
//! Expansion is a pure function of (schedule, start, horizon): no clock, no
//! hidden state. The open-ended schedule is modeled as a restartable lazy
//! iterator that a caller re-invokes with an advanced horizon as time
//! passes.

use chrono::{DateTime, Duration, Utc};

use super::{SchedulerError, SchedulerResult};
use crate::models::Schedule;

/// One occurrence a schedule calls for, before it becomes a stored instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDose {
    /// When the dose is due
    pub time: DateTime<Utc>,
    /// Quantity to take
    pub amount: f64,
    /// Unit label
    pub unit: String,
}

/// Expand every template occurrence with time in `[schedule_start,
/// horizon_end)`, ascending by time, ties broken by declared template order.
///
/// Fails with `InvalidHorizon` when the horizon is not after the start.
pub fn expand(
    schedule: &Schedule,
    schedule_start: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
) -> SchedulerResult<Occurrences<'_>> {
    if horizon_end <= schedule_start {
        return Err(SchedulerError::InvalidHorizon {
            schedule_start,
            horizon_end,
        });
    }
    Ok(Occurrences::new(
        schedule,
        schedule_start,
        schedule_start,
        horizon_end,
    ))
}

/// Like [`expand`], but yields only occurrences with `time >= since`.
///
/// Used for incremental expansion: `since` is the horizon a previous
/// expansion already covered. Callers guarantee `since >= schedule_start`;
/// an empty window just yields nothing.
pub(crate) fn expand_from(
    schedule: &Schedule,
    schedule_start: DateTime<Utc>,
    since: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
) -> Occurrences<'_> {
    Occurrences::new(schedule, schedule_start, since, horizon_end)
}

/// Lazy iterator over the dose occurrences of one schedule.
pub struct Occurrences<'a> {
    schedule: &'a Schedule,
    /// Template indices sorted by (offset, declared position)
    order: Vec<usize>,
    schedule_start: DateTime<Utc>,
    since: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
    /// Current period number (k in start + k * period + offset)
    period_index: i64,
    /// Position within `order` for the current period
    template_pos: usize,
    done: bool,
}

impl<'a> Occurrences<'a> {
    fn new(
        schedule: &'a Schedule,
        schedule_start: DateTime<Utc>,
        since: DateTime<Utc>,
        horizon_end: DateTime<Utc>,
    ) -> Self {
        let mut order: Vec<usize> = (0..schedule.doses.len()).collect();
        order.sort_by_key(|&i| schedule.doses[i].offset_ms);

        // Skip whole periods that end before `since`
        let elapsed_ms = (since - schedule_start).num_milliseconds().max(0);
        let period_index = elapsed_ms / schedule.period_ms;

        Self {
            schedule,
            order,
            schedule_start,
            since,
            horizon_end,
            period_index,
            template_pos: 0,
            done: false,
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = PlannedDose;

    fn next(&mut self) -> Option<PlannedDose> {
        if self.done || self.order.is_empty() {
            return None;
        }
        loop {
            if self.template_pos == self.order.len() {
                self.period_index += 1;
                self.template_pos = 0;
            }
            let template = &self.schedule.doses[self.order[self.template_pos]];
            self.template_pos += 1;

            let time = self.schedule_start
                + Duration::milliseconds(
                    self.period_index * self.schedule.period_ms + template.offset_ms,
                );
            if time >= self.horizon_end {
                // Offsets ascend within a period, so every remaining
                // occurrence is at or past the horizon
                self.done = true;
                return None;
            }
            if time < self.since {
                continue;
            }
            return Some(PlannedDose {
                time,
                amount: template.amount,
                unit: template.unit.clone(),
            });
        }
    }
}
