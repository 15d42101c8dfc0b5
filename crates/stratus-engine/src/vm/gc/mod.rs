//! Garbage collection
//!
//! The heap owns every object; values only hold [`ObjectRef`](crate::vm::ObjectRef)
//! handles. Roots are the slots of every live frame plus the pinned set.

pub mod collector;
pub mod heap;
pub mod roots;

pub use collector::{Collector, GcStats};
pub use heap::{Heap, HeapObject};
pub use roots::RootSet;
