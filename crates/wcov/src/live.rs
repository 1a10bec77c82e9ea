//! Published, in-place-updatable instrumented units.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::Instrumented;

/// The currently installed version of an instrumented unit.
///
/// Readers take cheap `Arc` snapshots. Writers update under the write lock;
/// a snapshot held elsewhere is copied first, so every reader sees either the
/// old or the new unit, never a partial write.
#[derive(Debug)]
pub struct LiveUnit {
    current: RwLock<Arc<Instrumented>>,
}

impl LiveUnit {
    #[must_use]
    pub fn new(unit: Instrumented) -> Self {
        Self {
            current: RwLock::new(Arc::new(unit)),
        }
    }

    /// The installed unit as of now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Instrumented> {
        Arc::clone(&self.current.read())
    }

    /// Mutate the installed unit.
    ///
    /// In place when no snapshot is outstanding, copy-on-write otherwise.
    pub fn update<R>(&self, f: impl FnOnce(&mut Instrumented) -> R) -> R {
        let mut current = self.current.write();
        f(Arc::make_mut(&mut current))
    }

    /// Install a new version of the unit wholesale.
    pub fn replace(&self, unit: Instrumented) -> Arc<Instrumented> {
        std::mem::replace(&mut *self.current.write(), Arc::new(unit))
    }
}
