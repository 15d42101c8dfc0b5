//! Mark-sweep garbage collector
//!
//! Stop-the-world and non-generational. A cycle runs every `interval`
//! allocations. Marking walks an explicit worklist from the roots and uses
//! each object's layout to find its references:
//! - class and interface objects: the slots the layout marks as references
//! - arrays: every element, when the element kind is a reference
//! - unions: the payload, when the member selected by the tag is a reference

use super::heap::{Heap, HeapObject};
use crate::compiler::layout::{LayoutKind, RuntimeLayout, SlotKind, ARRAY_HEADER, UNION_PAYLOAD};
use crate::vm::value::ObjectRef;
use crate::vm::{VmError, VmResult};
use std::time::Instant;

/// Garbage collector statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed collection cycles
    pub collections: usize,
    /// Objects allocated by the running program
    pub allocations: usize,
    /// Objects freed across all cycles
    pub freed: usize,
    /// Objects currently on the heap
    pub live: usize,
}

/// Mark-sweep garbage collector
#[derive(Debug)]
pub struct Collector {
    /// Allocations between cycles; 0 disables automatic cycles
    interval: usize,
    since_last: usize,
    stats: GcStats,
}

impl Collector {
    pub fn new(interval: usize) -> Self {
        Self {
            interval,
            since_last: 0,
            stats: GcStats::default(),
        }
    }

    /// Record an allocation about to happen; returns whether a cycle is due first
    pub fn note_allocation(&mut self) -> bool {
        self.stats.allocations += 1;
        self.since_last += 1;
        if self.interval > 0 && self.since_last > self.interval {
            self.since_last = 1;
            return true;
        }
        false
    }

    pub fn stats(&self, heap: &Heap) -> GcStats {
        GcStats {
            live: heap.len(),
            ..self.stats
        }
    }

    /// Run one full cycle; returns the number of objects freed
    pub fn collect(
        &mut self,
        heap: &mut Heap,
        layouts: &[RuntimeLayout],
        roots: impl IntoIterator<Item = ObjectRef>,
    ) -> VmResult<usize> {
        let start = Instant::now();
        let marked = mark(heap, layouts, roots)?;
        let freed = heap.sweep();

        self.stats.collections += 1;
        self.stats.freed += freed;
        log::debug!(
            "gc cycle {}: marked {}, freed {}, live {} ({} bytes) in {:?}",
            self.stats.collections,
            marked,
            freed,
            heap.len(),
            heap.allocated_bytes(),
            start.elapsed()
        );
        Ok(freed)
    }
}

/// Mark everything reachable from `roots`; returns the number of objects marked
fn mark(heap: &mut Heap, layouts: &[RuntimeLayout], roots: impl IntoIterator<Item = ObjectRef>) -> VmResult<usize> {
    let mut worklist: Vec<ObjectRef> = roots.into_iter().collect();
    let mut marked = 0;
    while let Some(r) = worklist.pop() {
        let object = heap.get_mut(r)?;
        if object.marked {
            continue;
        }
        object.marked = true;
        marked += 1;
        trace(object, layouts, &mut worklist)?;
    }
    Ok(marked)
}

/// Push every reference held by `object`
fn trace(object: &HeapObject, layouts: &[RuntimeLayout], worklist: &mut Vec<ObjectRef>) -> VmResult<()> {
    let layout = layouts
        .get(object.layout as usize)
        .ok_or_else(|| VmError::CorruptChunk(format!("object with unknown layout {}", object.layout)))?;
    match &layout.kind {
        LayoutKind::Class { .. } | LayoutKind::Interface { .. } => {
            for offset in layout.reference_offsets() {
                worklist.extend(object.read_ref(offset)?);
            }
        }
        LayoutKind::Array { element, stride } => {
            if element.is_ref() {
                let length = object.array_length()?;
                for i in 0..length {
                    let offset = u64::from(ARRAY_HEADER) + i * u64::from(*stride);
                    let offset = u32::try_from(offset)
                        .map_err(|_| VmError::CorruptChunk("array larger than 4 GiB".to_string()))?;
                    worklist.extend(object.read_ref(offset)?);
                }
            }
        }
        LayoutKind::Union { members } => {
            let tag = object.read_u64(0)?;
            let kind = usize::try_from(tag).ok().and_then(|t| members.get(t));
            if kind == Some(&SlotKind::Ref) {
                worklist.extend(object.read_ref(UNION_PAYLOAD)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::layout::FieldSlot;
    use crate::vm::value::Value;

    fn layouts() -> Vec<RuntimeLayout> {
        vec![
            RuntimeLayout {
                name: "string".into(),
                kind: LayoutKind::Array {
                    element: SlotKind::U8,
                    stride: 1,
                },
                size: 8,
                align: 8,
            },
            RuntimeLayout {
                name: "Node".into(),
                kind: LayoutKind::Class {
                    fields: vec![
                        FieldSlot {
                            offset: 0,
                            kind: SlotKind::I64,
                        },
                        FieldSlot {
                            offset: 8,
                            kind: SlotKind::Ref,
                        },
                    ],
                },
                size: 16,
                align: 8,
            },
            RuntimeLayout {
                name: "i64 | Node".into(),
                kind: LayoutKind::Union {
                    members: vec![SlotKind::I64, SlotKind::Ref],
                },
                size: 16,
                align: 8,
            },
        ]
    }

    #[test]
    fn test_unreachable_objects_are_freed() {
        let layouts = layouts();
        let mut heap = Heap::new();
        let kept = heap.allocate(1, 16);
        let child = heap.allocate(1, 16);
        let garbage = heap.allocate(1, 16);
        heap.get_mut(kept).unwrap().write_slot(8, SlotKind::Ref, Value::Object(child)).unwrap();

        let mut gc = Collector::new(0);
        assert_eq!(gc.collect(&mut heap, &layouts, [kept]).unwrap(), 1);
        assert!(heap.contains(kept));
        assert!(heap.contains(child));
        assert!(!heap.contains(garbage));
        assert_eq!(gc.stats(&heap).live, 2);
    }

    #[test]
    fn test_scalar_slots_are_not_traced() {
        let layouts = layouts();
        let mut heap = Heap::new();
        let node = heap.allocate(1, 16);
        let other = heap.allocate(1, 16);
        // an integer field that happens to look like a reference to `other`
        heap.get_mut(node).unwrap().write_u64(0, other.to_bits()).unwrap();

        let mut gc = Collector::new(0);
        gc.collect(&mut heap, &layouts, [node]).unwrap();
        assert!(!heap.contains(other));
    }

    #[test]
    fn test_union_payload_follows_tag() {
        let layouts = layouts();
        let mut heap = Heap::new();
        let target = heap.allocate(1, 16);
        let boxed = heap.allocate(2, 16);
        {
            let object = heap.get_mut(boxed).unwrap();
            object.write_u64(0, 1).unwrap();
            object.write_slot(UNION_PAYLOAD, SlotKind::Ref, Value::Object(target)).unwrap();
        }
        let mut gc = Collector::new(0);
        gc.collect(&mut heap, &layouts, [boxed]).unwrap();
        assert!(heap.contains(target));

        // same bits under the integer tag are not a reference
        heap.get_mut(boxed).unwrap().write_u64(0, 0).unwrap();
        gc.collect(&mut heap, &layouts, [boxed]).unwrap();
        assert!(!heap.contains(target));
    }

    #[test]
    fn test_cycles_terminate() {
        let layouts = layouts();
        let mut heap = Heap::new();
        let a = heap.allocate(1, 16);
        let b = heap.allocate(1, 16);
        heap.get_mut(a).unwrap().write_slot(8, SlotKind::Ref, Value::Object(b)).unwrap();
        heap.get_mut(b).unwrap().write_slot(8, SlotKind::Ref, Value::Object(a)).unwrap();

        let mut gc = Collector::new(0);
        assert_eq!(gc.collect(&mut heap, &layouts, [a]).unwrap(), 0);
        assert_eq!(gc.collect(&mut heap, &layouts, std::iter::empty()).unwrap(), 2);
        assert_eq!(gc.stats(&heap).collections, 2);
    }

    #[test]
    fn test_interval() {
        let mut gc = Collector::new(2);
        assert!(!gc.note_allocation());
        assert!(!gc.note_allocation());
        assert!(gc.note_allocation());
        assert!(!gc.note_allocation());
        assert_eq!(gc.stats.allocations, 4);
    }
}
