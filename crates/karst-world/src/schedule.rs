use karst_core::{NEVER, ObjectGuid};

/// A per-cell schedule list: entity guids ordered ascending by their next
/// scheduled time, FIFO among equal times.
///
/// An entity whose next time is the [`NEVER`] sentinel is not admitted; the
/// cell simply never visits it for that schedule. Processing pops ready
/// entries from the front and reinserts each at its new time, so a ready
/// item is always handled before a not-yet-ready one.
#[derive(Debug, Default)]
pub struct ScheduleList {
    entries: Vec<(f64, ObjectGuid)>,
}

impl ScheduleList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted insert: after every entry with an equal or earlier time.
    /// `NEVER` entries are omitted.
    pub fn insert(&mut self, time: f64, guid: ObjectGuid) {
        if time == NEVER {
            return;
        }
        let idx = self.entries.partition_point(|(t, _)| *t <= time);
        self.entries.insert(idx, (time, guid));
    }

    /// Append at the tail without re-sorting. Used by schedules whose
    /// members all share one fixed interval, where tail order is time
    /// order. `NEVER` entries are omitted.
    pub fn push_back(&mut self, time: f64, guid: ObjectGuid) {
        if time == NEVER {
            return;
        }
        self.entries.push((time, guid));
    }

    /// Pop the front entry if it is due at `now`.
    pub fn pop_ready(&mut self, now: f64) -> Option<ObjectGuid> {
        match self.entries.first() {
            Some((t, _)) if *t <= now => Some(self.entries.remove(0).1),
            _ => None,
        }
    }

    /// Remove every entry for a guid.
    pub fn remove(&mut self, guid: ObjectGuid) {
        self.entries.retain(|(_, g)| *g != guid);
    }

    /// Whether a guid is scheduled.
    pub fn contains(&self, guid: ObjectGuid) -> bool {
        self.entries.iter().any(|(_, g)| *g == guid)
    }

    /// Move an already-scheduled guid to a new time, keeping sort order.
    /// A guid not present is left absent.
    pub fn resort(&mut self, guid: ObjectGuid, time: f64) {
        if self.contains(guid) {
            self.remove(guid);
            self.insert(time, guid);
        }
    }

    /// Number of scheduled entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The earliest scheduled time.
    pub fn first_time(&self) -> Option<f64> {
        self.entries.first().map(|(t, _)| *t)
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].0 <= w[1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(n: u32) -> ObjectGuid {
        ObjectGuid(n)
    }

    #[test]
    fn insert_keeps_ascending_order() {
        let mut list = ScheduleList::new();
        list.insert(5.0, g(1));
        list.insert(1.0, g(2));
        list.insert(3.0, g(3));
        assert!(list.is_sorted());
        assert_eq!(list.pop_ready(10.0), Some(g(2)));
        assert_eq!(list.pop_ready(10.0), Some(g(3)));
        assert_eq!(list.pop_ready(10.0), Some(g(1)));
    }

    #[test]
    fn equal_times_break_ties_fifo() {
        let mut list = ScheduleList::new();
        list.insert(2.0, g(1));
        list.insert(2.0, g(2));
        list.insert(2.0, g(3));
        assert_eq!(list.pop_ready(2.0), Some(g(1)));
        assert_eq!(list.pop_ready(2.0), Some(g(2)));
        assert_eq!(list.pop_ready(2.0), Some(g(3)));
    }

    #[test]
    fn never_sentinel_is_omitted() {
        let mut list = ScheduleList::new();
        list.insert(NEVER, g(1));
        list.push_back(NEVER, g(2));
        assert!(list.is_empty());
    }

    #[test]
    fn not_ready_entry_stops_popping() {
        let mut list = ScheduleList::new();
        list.insert(1.0, g(1));
        list.insert(9.0, g(2));
        assert_eq!(list.pop_ready(5.0), Some(g(1)));
        assert_eq!(list.pop_ready(5.0), None);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_clears_guid() {
        let mut list = ScheduleList::new();
        list.insert(1.0, g(1));
        list.insert(2.0, g(2));
        list.remove(g(1));
        assert!(!list.contains(g(1)));
        assert!(list.contains(g(2)));
    }

    #[test]
    fn resort_moves_entry() {
        let mut list = ScheduleList::new();
        list.insert(1.0, g(1));
        list.insert(2.0, g(2));
        list.resort(g(1), 5.0);
        assert!(list.is_sorted());
        assert_eq!(list.pop_ready(10.0), Some(g(2)));
        assert_eq!(list.pop_ready(10.0), Some(g(1)));
    }

    #[test]
    fn resort_unknown_guid_is_noop() {
        let mut list = ScheduleList::new();
        list.insert(1.0, g(1));
        list.resort(g(9), 5.0);
        assert_eq!(list.len(), 1);
        assert!(!list.contains(g(9)));
    }

    proptest::proptest! {
        #[test]
        fn stays_sorted_under_random_churn(
            ops in proptest::collection::vec((0u32..50, 0.0f64..1000.0), 1..200)
        ) {
            let mut list = ScheduleList::new();
            for (i, (id, time)) in ops.iter().enumerate() {
                if i % 3 == 2 {
                    list.remove(g(*id));
                } else {
                    list.insert(*time, g(*id));
                }
                proptest::prop_assert!(list.is_sorted());
            }
        }

        #[test]
        fn reinsertion_after_pop_stays_sorted(
            times in proptest::collection::vec(0.0f64..100.0, 1..50),
            bump in 0.1f64..50.0
        ) {
            let mut list = ScheduleList::new();
            for (i, t) in times.iter().enumerate() {
                list.insert(*t, g(i as u32));
            }
            // Drain everything due by 100 and reschedule later, like a tick.
            while let Some(guid) = list.pop_ready(100.0) {
                list.insert(100.0 + bump, guid);
                proptest::prop_assert!(list.is_sorted());
                if list.first_time().is_none_or(|t| t > 100.0) {
                    break;
                }
            }
            proptest::prop_assert_eq!(list.len(), times.len());
        }
    }
}
