//! GC root tracking
//!
//! Frame slots are scanned directly by the collector. This set holds the
//! extra roots: objects pinned while native code holds pointers into them.

use crate::vm::value::ObjectRef;
use rustc_hash::FxHashMap;

/// Pinned objects, with a count per object so pins can nest
#[derive(Debug, Default)]
pub struct RootSet {
    pinned: FxHashMap<ObjectRef, usize>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&mut self, object: ObjectRef) {
        *self.pinned.entry(object).or_insert(0) += 1;
    }

    pub fn unpin(&mut self, object: ObjectRef) {
        if let Some(count) = self.pinned.get_mut(&object) {
            *count -= 1;
            if *count == 0 {
                self.pinned.remove(&object);
            }
        }
    }

    pub fn is_pinned(&self, object: ObjectRef) -> bool {
        self.pinned.contains_key(&object)
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.pinned.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}
