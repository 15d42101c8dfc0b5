//! Default constants for VM configuration.

/// Allocations between two automatic collections.
pub const DEFAULT_GC_INTERVAL: usize = 1024;

/// Instructions executed between two wall-clock timeout checks.
pub const DEFAULT_POLL_INTERVAL: u64 = 4096;

/// Initial capacity of a fresh frame's slot array.
pub const FRAME_CAPACITY: usize = 16;

/// Deepest call chain before the VM reports a stack overflow.
pub const MAX_CALL_DEPTH: usize = 65_536;
