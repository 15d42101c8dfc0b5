//! Call frames
//!
//! A frame's slot array holds its locals first (arguments, then declared
//! locals and temporaries, sized by the function's `Frame` instruction)
//! and its operand stack above them. Finished frames go back to a pool and
//! are reused by later calls.

use super::defaults::FRAME_CAPACITY;
use super::value::{ObjectRef, Value};
use super::{VmError, VmResult};

#[derive(Debug, Default)]
pub struct Frame {
    pub slots: Vec<Value>,
    /// Caller's instruction pointer after the call
    pub return_ip: usize,
}

impl Frame {
    pub fn push(&mut self, value: Value) {
        self.slots.push(value);
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.slots.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self) -> VmResult<Value> {
        self.slots.last().copied().ok_or(VmError::StackUnderflow)
    }

    /// Remove the top `count` values, keeping their order
    pub fn pop_n(&mut self, count: usize) -> VmResult<std::vec::Drain<'_, Value>> {
        let start = self.slots.len().checked_sub(count).ok_or(VmError::StackUnderflow)?;
        Ok(self.slots.drain(start..))
    }

    pub fn local(&self, slot: u16) -> VmResult<Value> {
        self.slots
            .get(slot as usize)
            .copied()
            .ok_or_else(|| VmError::CorruptChunk(format!("read of unreserved local slot {}", slot)))
    }

    pub fn set_local(&mut self, slot: u16, value: Value) -> VmResult<()> {
        let target = self
            .slots
            .get_mut(slot as usize)
            .ok_or_else(|| VmError::CorruptChunk(format!("write to unreserved local slot {}", slot)))?;
        *target = value;
        Ok(())
    }

    /// Size the local area; arguments already in place are kept
    pub fn reserve(&mut self, locals: u16) {
        self.slots.resize(locals as usize, Value::Null);
    }
}

/// The frame stack plus a pool of finished frames
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
    pool: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame whose first slots are `args`
    pub fn push(&mut self, return_ip: usize, args: impl IntoIterator<Item = Value>) {
        let mut frame = self.pool.pop().unwrap_or_else(|| Frame {
            slots: Vec::with_capacity(FRAME_CAPACITY),
            return_ip: 0,
        });
        frame.return_ip = return_ip;
        frame.slots.extend(args);
        self.frames.push(frame);
    }

    /// Pop the current frame and return it to the pool; yields its return address
    pub fn pop(&mut self) -> VmResult<usize> {
        let mut frame = self.frames.pop().ok_or(VmError::StackUnderflow)?;
        let return_ip = frame.return_ip;
        frame.slots.clear();
        self.pool.push(frame);
        Ok(return_ip)
    }

    pub fn current(&mut self) -> VmResult<&mut Frame> {
        self.frames.last_mut().ok_or(VmError::StackUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Every object referenced from any live frame
    pub fn roots(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.frames
            .iter()
            .flat_map(|f| f.slots.iter())
            .filter_map(Value::object)
    }

    pub fn clear(&mut self) {
        while self.pop().is_ok() {}
    }
}
