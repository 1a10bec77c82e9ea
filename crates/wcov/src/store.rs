//! Executed-line bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::UnitId;

/// Lines executed so far, per unit.
///
/// Shared through an `Arc` between the probe trigger that writes it and the
/// reporting side that reads it.
#[derive(Debug, Default)]
pub struct CoverageStore {
    lines: Mutex<FxHashMap<UnitId, BTreeSet<u32>>>,
}

impl CoverageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `line` of `unit` executed. Returns `true` if it is new.
    pub fn record(&self, unit: &UnitId, line: u32) -> bool {
        let mut lines = self.lines.lock();
        match lines.get_mut(unit) {
            Some(set) => set.insert(line),
            None => {
                lines.insert(unit.clone(), BTreeSet::from([line]));
                true
            }
        }
    }

    /// Copy of everything recorded, ordered by unit.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<UnitId, BTreeSet<u32>> {
        self.lines
            .lock()
            .iter()
            .map(|(unit, lines)| (unit.clone(), lines.clone()))
            .collect()
    }

    /// Executed lines merged per source file.
    #[must_use]
    pub fn by_file(&self) -> BTreeMap<String, BTreeSet<u32>> {
        let mut files: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        for (unit, lines) in self.lines.lock().iter() {
            files
                .entry(unit.file.clone())
                .or_default()
                .extend(lines.iter().copied());
        }
        files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let store = CoverageStore::new();
        let foo = UnitId::new("a.py", "foo");
        let bar = UnitId::new("a.py", "bar");

        assert!(store.is_empty());
        assert!(store.record(&foo, 3));
        assert!(!store.record(&foo, 3));
        assert!(store.record(&bar, 1));
        assert!(store.record(&foo, 2));

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[&foo], BTreeSet::from([2, 3]));
        assert_eq!(snap[&bar], BTreeSet::from([1]));
    }

    #[test]
    fn test_by_file_merges_units() {
        let store = CoverageStore::new();
        store.record(&UnitId::new("a.py", "foo"), 3);
        store.record(&UnitId::new("a.py", "bar"), 7);
        store.record(&UnitId::new("b.py", "foo"), 3);

        let files = store.by_file();
        assert_eq!(files["a.py"], BTreeSet::from([3, 7]));
        assert_eq!(files["b.py"], BTreeSet::from([3]));
    }

    #[test]
    fn test_concurrent_records_keep_every_line() {
        let store = CoverageStore::new();
        let unit = UnitId::new("a.py", "foo");

        std::thread::scope(|s| {
            for t in 0..8u32 {
                let (store, unit) = (&store, &unit);
                s.spawn(move || {
                    // Overlapping windows: thread t covers t * 50 .. t * 50 + 100.
                    for line in t * 50..t * 50 + 100 {
                        store.record(unit, line);
                    }
                });
            }
        });

        assert_eq!(store.snapshot()[&unit], (0..450).collect::<BTreeSet<u32>>());
    }

    #[test]
    fn test_clear() {
        let store = CoverageStore::new();
        store.record(&UnitId::new("a.py", "foo"), 1);
        store.clear();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }
}
