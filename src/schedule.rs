use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::AvailabilitySlot;

/// Client-side view of one doctor's availability: slots bucketed per UTC
/// date, each bucket sorted ascending by start time. Built whole from a
/// schedule response; the caller only swaps its cached copy on success, so a
/// failed refresh never partially overwrites the previous schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBook {
    slots_by_date: BTreeMap<NaiveDate, Vec<AvailabilitySlot>>,
}

impl ScheduleBook {
    pub fn from_slots(mut slots: Vec<AvailabilitySlot>) -> Self {
        slots.sort_by_key(|s| s.start);

        let mut slots_by_date: BTreeMap<NaiveDate, Vec<AvailabilitySlot>> = BTreeMap::new();
        for slot in slots {
            slots_by_date
                .entry(slot.start.date_naive())
                .or_default()
                .push(slot);
        }
        Self { slots_by_date }
    }

    pub fn slots_on(&self, date: NaiveDate) -> &[AvailabilitySlot] {
        self.slots_by_date
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Dates worth enabling in a calendar: at least one slot that is still
    /// open and ends in the future.
    pub fn bookable_dates(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        self.slots_by_date
            .iter()
            .filter(|(_, slots)| slots.iter().any(|s| s.is_selectable(now)))
            .map(|(date, _)| *date)
            .collect()
    }

    /// Look the chosen slot back up by its start time. Submission fails fast
    /// when the slot has vanished from the cached schedule.
    pub fn resolve(&self, start: DateTime<Utc>) -> Option<&AvailabilitySlot> {
        self.slots_on(start.date_naive())
            .iter()
            .find(|s| s.start == start)
    }

    pub fn is_empty(&self) -> bool {
        self.slots_by_date.is_empty()
    }
}
