//! Field, element, allocation and native-call opcodes

use super::Interpreter;
use crate::compiler::bytecode::Opcode;
use crate::compiler::layout::{LayoutKind, SlotKind, ARRAY_HEADER, UNION_PAYLOAD};
use crate::vm::ffi::RawArg;
use crate::vm::gc::Heap;
use crate::vm::value::{ObjectRef, Value};
use crate::vm::{VmError, VmResult};
use std::ffi::c_void;

/// Slot kind read by a field load opcode
pub(super) fn load_kind(opcode: Opcode) -> SlotKind {
    match opcode {
        Opcode::LoadI8 => SlotKind::I8,
        Opcode::LoadI16 => SlotKind::I16,
        Opcode::LoadI32 => SlotKind::I32,
        Opcode::LoadU8 => SlotKind::U8,
        Opcode::LoadU16 => SlotKind::U16,
        Opcode::LoadU32 => SlotKind::U32,
        Opcode::LoadF32 => SlotKind::F32,
        Opcode::LoadF64 => SlotKind::F64,
        Opcode::LoadBool => SlotKind::Bool,
        Opcode::LoadRef => SlotKind::Ref,
        _ => SlotKind::I64,
    }
}

/// Slot kind written by a field store opcode; signedness does not matter when truncating
pub(super) fn store_kind(opcode: Opcode) -> SlotKind {
    match opcode {
        Opcode::Store8 => SlotKind::U8,
        Opcode::Store16 => SlotKind::U16,
        Opcode::Store32 => SlotKind::U32,
        Opcode::StoreF32 => SlotKind::F32,
        Opcode::StoreF64 => SlotKind::F64,
        Opcode::StoreBool => SlotKind::Bool,
        Opcode::StoreRef => SlotKind::Ref,
        _ => SlotKind::I64,
    }
}

/// Address native code sees for an object: the elements of an array, the bytes of anything else
fn data_pointer(heap: &mut Heap, is_array: bool, object: ObjectRef) -> VmResult<*mut c_void> {
    let data = &mut heap.get_mut(object)?.data;
    let start = if is_array { ARRAY_HEADER as usize } else { 0 };
    Ok(data[start..].as_mut_ptr().cast())
}

impl Interpreter {
    pub(super) fn load_field(&mut self, offset: u32, kind: SlotKind) -> VmResult<()> {
        let object = self.pop_object()?;
        let value = self.heap.get(object)?.read_slot(offset, kind)?;
        self.push(value)
    }

    pub(super) fn store_field(&mut self, offset: u32, kind: SlotKind) -> VmResult<()> {
        let value = self.pop()?;
        let object = self.pop_object()?;
        self.heap.get_mut(object)?.write_slot(offset, kind, value)
    }

    pub(super) fn load_element(&mut self, kind: SlotKind) -> VmResult<()> {
        let index = self.pop_int()?;
        let array = self.pop_object()?;
        let object = self.heap.get(array)?;
        let offset = object.element_offset(index, kind.size())?;
        let value = object.read_slot(offset, kind)?;
        self.push(value)
    }

    pub(super) fn store_element(&mut self, kind: SlotKind) -> VmResult<()> {
        let value = self.pop()?;
        let index = self.pop_int()?;
        let array = self.pop_object()?;
        let object = self.heap.get_mut(array)?;
        let offset = object.element_offset(index, kind.size())?;
        object.write_slot(offset, kind, value)
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// `New` and `InterfaceNew`: a zeroed fixed-size object
    pub(super) fn new_object(&mut self, layout: u32) -> VmResult<()> {
        self.reserve_allocation()?;
        let size = self.layout(layout)?.size as usize;
        let object = self.heap.allocate(layout, size);
        self.push(Value::Object(object))
    }

    pub(super) fn new_array(&mut self, layout: u32) -> VmResult<()> {
        self.reserve_allocation()?;
        let length = self.pop_int()?;
        let length = u64::try_from(length).map_err(|_| VmError::IndexOutOfBounds { index: length, length: 0 })?;
        let size = self
            .layout(layout)?
            .allocation_size(length)
            .ok_or_else(|| VmError::CorruptChunk(format!("array of {} elements is too large", length)))?;
        let array = self.heap.allocate_array(layout, size, length);
        self.push(Value::Object(array))
    }

    pub(super) fn make_union(&mut self, layout: u32, tag: u32) -> VmResult<()> {
        let kind = match &self.layout(layout)?.kind {
            LayoutKind::Union { members } => members.get(tag as usize).copied(),
            _ => None,
        }
        .ok_or_else(|| VmError::CorruptChunk(format!("layout {} has no union member {}", layout, tag)))?;

        self.reserve_allocation()?;
        let payload = self.pop()?;
        let union = self.heap.allocate(layout, 16);
        let object = self.heap.get_mut(union)?;
        object.write_u64(0, u64::from(tag))?;
        object.write_slot(UNION_PAYLOAD, kind, payload)?;
        self.push(Value::Object(union))
    }

    pub(super) fn union_payload(&mut self, kind: SlotKind) -> VmResult<()> {
        let union = self.pop_object()?;
        let value = self.heap.get(union)?.read_slot(UNION_PAYLOAD, kind)?;
        self.push(value)
    }

    /// Compare two boxed unions by tag, then by payload
    ///
    /// Payloads of tags set in `strings` compare by bytes; other references
    /// compare by identity.
    pub(super) fn unions_equal(&mut self, layout: u32, strings: u32) -> VmResult<bool> {
        let b = self.pop()?;
        let a = self.pop()?;
        let (a, b) = match (a, b) {
            (Value::Object(a), Value::Object(b)) => (a, b),
            (a, b) => return Ok(a.same(&b)),
        };
        if a == b {
            return Ok(true);
        }

        let tag = self.heap.get(a)?.read_u64(0)?;
        if tag != self.heap.get(b)?.read_u64(0)? {
            return Ok(false);
        }
        let kind = match &self.layout(layout)?.kind {
            LayoutKind::Union { members } => usize::try_from(tag).ok().and_then(|t| members.get(t)).copied(),
            _ => None,
        }
        .ok_or_else(|| VmError::CorruptChunk(format!("layout {} has no union member {}", layout, tag)))?;

        let left = self.heap.get(a)?.read_slot(UNION_PAYLOAD, kind)?;
        let right = self.heap.get(b)?.read_slot(UNION_PAYLOAD, kind)?;
        match (left, right) {
            (Value::Object(x), Value::Object(y)) if tag < 32 && strings & (1 << tag) != 0 => {
                Ok(x == y || self.heap.get(x)?.elements() == self.heap.get(y)?.elements())
            }
            (left, right) => Ok(left.same(&right)),
        }
    }

    // ========================================================================
    // Native calls
    // ========================================================================

    /// Call a foreign function with arguments from the operand stack
    ///
    /// Object arguments are pinned for the duration of the call. No
    /// collection can run before they are unpinned.
    pub(super) fn native_call(&mut self, index: u32) -> VmResult<()> {
        let function = self
            .bridge
            .get(index)
            .ok_or_else(|| VmError::CorruptChunk(format!("unknown foreign function {}", index)))?;

        self.scratch.clear();
        let caller = self.frames.current()?;
        self.scratch.extend(caller.pop_n(function.params.len())?);

        let mut raw = Vec::with_capacity(self.scratch.len());
        let mut pinned = Vec::new();
        for (kind, value) in function.params.iter().zip(&self.scratch) {
            match (kind, value) {
                (SlotKind::Ref | SlotKind::U64, Value::Object(object)) => {
                    let is_array = self
                        .chunk
                        .layouts
                        .get(self.heap.get(*object)?.layout as usize)
                        .is_some_and(|l| matches!(l.kind, LayoutKind::Array { .. }));
                    self.roots.pin(*object);
                    pinned.push(*object);
                    raw.push(RawArg::Ptr(data_pointer(&mut self.heap, is_array, *object)?));
                }
                (kind, value) => raw.push(RawArg::scalar(*kind, *value)?),
            }
        }

        log::trace!("native call {}({} args)", function.name, raw.len());
        // SAFETY: the descriptor was built from these parameter kinds, and every
        // pointer targets a pinned object whose bytes do not move
        let result = unsafe { function.call(&raw) };
        for object in pinned {
            self.roots.unpin(object);
        }
        if function.ret.is_some() {
            self.push(result)?;
        }
        Ok(())
    }
}
