//! Bytecode interpreter
//!
//! Decodes one opcode at a time from the chunk's code and dispatches on
//! it. Arithmetic, comparison and string opcodes live in `ops`; field,
//! element, allocation and native-call opcodes live in `memory`.

mod memory;
mod ops;

use super::defaults::MAX_CALL_DEPTH;
use super::ffi::ForeignBridge;
use super::frame::{Frame, FrameStack};
use super::gc::{Collector, GcStats, Heap, RootSet};
use super::options::VmOptions;
use super::value::{ObjectRef, Value};
use super::{VmError, VmResult};
use crate::compiler::bytecode::{Chunk, Constant, Opcode};
use crate::compiler::layout::{RuntimeLayout, SlotKind, STRING_ARRAY_LAYOUT, STRING_LAYOUT};
use std::time::Instant;

/// Result of executing a single opcode
#[derive(Debug)]
pub(crate) enum OpcodeResult {
    Continue,
    /// The entry frame returned
    Halt(Value),
}

/// Interpreter state for one chunk
#[derive(Debug)]
pub struct Interpreter {
    chunk: Chunk,
    heap: Heap,
    collector: Collector,
    roots: RootSet,
    frames: FrameStack,
    bridge: ForeignBridge,
    options: VmOptions,
    ip: usize,
    /// Arguments in transit between frames
    scratch: Vec<Value>,
    executed: u64,
}

impl Interpreter {
    pub fn new(chunk: Chunk, args: &[String], options: VmOptions) -> VmResult<Self> {
        let bridge = ForeignBridge::load(&chunk.foreign_functions)?;
        let main = usize::try_from(chunk.main)
            .ok()
            .filter(|m| *m < chunk.code.len())
            .ok_or_else(|| VmError::CorruptChunk(format!("entry point {} outside the code", chunk.main)))?;
        for reserved in [STRING_LAYOUT, STRING_ARRAY_LAYOUT] {
            if chunk.layouts.get(reserved as usize).is_none() {
                return Err(VmError::CorruptChunk(format!("missing reserved layout {}", reserved)));
            }
        }

        let mut interpreter = Self {
            collector: Collector::new(options.gc_interval),
            chunk,
            heap: Heap::new(),
            roots: RootSet::new(),
            frames: FrameStack::new(),
            bridge,
            options,
            ip: main,
            scratch: Vec::new(),
            executed: 0,
        };
        let argv = interpreter.argument_array(args)?;
        interpreter.frames.push(main, [Value::Object(argv)]);
        Ok(interpreter)
    }

    /// The `string[]` seeded into the entry frame
    fn argument_array(&mut self, args: &[String]) -> VmResult<ObjectRef> {
        let strings: Vec<ObjectRef> = args
            .iter()
            .map(|a| self.heap.allocate_string(STRING_LAYOUT, a.as_bytes()))
            .collect();
        let size = self
            .layout(STRING_ARRAY_LAYOUT)?
            .allocation_size(strings.len() as u64)
            .ok_or_else(|| VmError::CorruptChunk("argument array too large".to_string()))?;
        let array = self.heap.allocate_array(STRING_ARRAY_LAYOUT, size, strings.len() as u64);
        let object = self.heap.get_mut(array)?;
        for (i, s) in strings.iter().enumerate() {
            let offset = object.element_offset(i as i64, SlotKind::Ref.size())?;
            object.write_slot(offset, SlotKind::Ref, Value::Object(*s))?;
        }
        Ok(array)
    }

    /// Execute until the entry frame returns
    pub fn run(&mut self) -> VmResult<Value> {
        let start = Instant::now();
        loop {
            if let Some(timeout) = self.options.timeout {
                self.executed += 1;
                if self.options.poll_interval > 0 && self.executed % self.options.poll_interval == 0 {
                    let elapsed = start.elapsed();
                    if elapsed > timeout {
                        log::warn!("execution exceeded {:?} after {} instructions", timeout, self.executed);
                        return Err(VmError::Timeout {
                            elapsed_ms: elapsed.as_millis() as u64,
                        });
                    }
                }
            }

            let at = self.ip;
            match self.step() {
                Ok(OpcodeResult::Continue) => {}
                Ok(OpcodeResult::Halt(value)) => return Ok(value),
                Err(error) => {
                    let function = self.chunk.function_containing(at).map_or("<unknown>", |f| f.name.as_str());
                    log::debug!("runtime error in {} at {}: {}", function, at, error);
                    return Err(error);
                }
            }
        }
    }

    pub fn gc_stats(&self) -> GcStats {
        self.collector.stats(&self.heap)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Run a collection cycle now
    pub fn collect_garbage(&mut self) -> VmResult<usize> {
        let roots = self.frames.roots().chain(self.roots.iter());
        self.collector.collect(&mut self.heap, &self.chunk.layouts, roots)
    }

    /// Count an allocation, collecting first when a cycle is due
    ///
    /// Called before an allocating opcode pops its operands, so those
    /// operands are still rooted by the frame.
    fn reserve_allocation(&mut self) -> VmResult<()> {
        if self.collector.note_allocation() {
            self.collect_garbage()?;
        }
        Ok(())
    }

    fn layout(&self, index: u32) -> VmResult<&RuntimeLayout> {
        self.chunk
            .layouts
            .get(index as usize)
            .ok_or_else(|| VmError::CorruptChunk(format!("unknown layout {}", index)))
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    fn fetch<const N: usize>(&mut self) -> VmResult<[u8; N]> {
        let bytes = self
            .chunk
            .code
            .get(self.ip..self.ip + N)
            .ok_or_else(|| VmError::CorruptChunk(format!("truncated instruction at {}", self.ip)))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.ip += N;
        Ok(out)
    }

    fn fetch_u8(&mut self) -> VmResult<u8> {
        Ok(self.fetch::<1>()?[0])
    }

    fn fetch_u16(&mut self) -> VmResult<u16> {
        Ok(u16::from_le_bytes(self.fetch()?))
    }

    fn fetch_u32(&mut self) -> VmResult<u32> {
        Ok(u32::from_le_bytes(self.fetch()?))
    }

    fn fetch_u64(&mut self) -> VmResult<u64> {
        Ok(u64::from_le_bytes(self.fetch()?))
    }

    fn fetch_kind(&mut self) -> VmResult<SlotKind> {
        let byte = self.fetch_u8()?;
        SlotKind::from_u8(byte).ok_or_else(|| VmError::CorruptChunk(format!("invalid slot kind {:#04x}", byte)))
    }

    /// Target of a jump whose operand is a constant index
    fn jump_target(&mut self) -> VmResult<usize> {
        let index = self.fetch_u32()?;
        self.chunk
            .constants
            .get(index)
            .and_then(Constant::as_u64)
            .and_then(|t| usize::try_from(t).ok())
            .ok_or_else(|| VmError::CorruptChunk(format!("jump through non-address constant {}", index)))
    }

    // ========================================================================
    // Operand stack
    // ========================================================================

    fn frame(&mut self) -> VmResult<&mut Frame> {
        self.frames.current()
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.frames.current()?.pop()
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        self.frames.current()?.push(value);
        Ok(())
    }

    fn pop_int(&mut self) -> VmResult<i64> {
        self.pop()?.as_int()
    }

    fn pop_float(&mut self) -> VmResult<f64> {
        self.pop()?.as_float()
    }

    fn pop_bool(&mut self) -> VmResult<bool> {
        self.pop()?.as_bool()
    }

    fn pop_object(&mut self) -> VmResult<ObjectRef> {
        self.pop()?.as_object()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn step(&mut self) -> VmResult<OpcodeResult> {
        let at = self.ip;
        let byte = self.fetch_u8()?;
        let opcode = Opcode::from_u8(byte).ok_or(VmError::InvalidOpcode { opcode: byte, ip: at })?;
        log::trace!("{:06} {}", at, opcode.name());

        match opcode {
            Opcode::Nop => {}
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let top = self.frame()?.peek()?;
                self.push(top)?;
            }
            Opcode::PushNull => self.push(Value::Null)?,
            Opcode::PushTrue => self.push(Value::Bool(true))?,
            Opcode::PushFalse => self.push(Value::Bool(false))?,
            Opcode::PushI8 => {
                let v = i8::from_le_bytes(self.fetch()?);
                self.push(Value::Int(i64::from(v)))?;
            }
            Opcode::PushI16 => {
                let v = i16::from_le_bytes(self.fetch()?);
                self.push(Value::Int(i64::from(v)))?;
            }
            Opcode::PushI32 => {
                let v = i32::from_le_bytes(self.fetch()?);
                self.push(Value::Int(i64::from(v)))?;
            }
            Opcode::PushI64 => {
                let v = i64::from_le_bytes(self.fetch()?);
                self.push(Value::Int(v))?;
            }
            Opcode::PushF32 => {
                let v = f32::from_le_bytes(self.fetch()?);
                self.push(Value::Float(f64::from(v)))?;
            }
            Opcode::PushF64 => {
                let v = f64::from_le_bytes(self.fetch()?);
                self.push(Value::Float(v))?;
            }
            Opcode::PushConst => {
                let index = self.fetch_u32()?;
                self.push_constant(index)?;
            }

            Opcode::Frame => {
                let locals = self.fetch_u16()?;
                self.frame()?.reserve(locals);
            }
            Opcode::LoadLocal => {
                let slot = self.fetch_u16()?;
                let value = self.frame()?.local(slot)?;
                self.push(value)?;
            }
            Opcode::StoreLocal => {
                let slot = self.fetch_u16()?;
                let value = self.pop()?;
                self.frame()?.set_local(slot, value)?;
            }

            Opcode::LoadI8
            | Opcode::LoadI16
            | Opcode::LoadI32
            | Opcode::LoadI64
            | Opcode::LoadU8
            | Opcode::LoadU16
            | Opcode::LoadU32
            | Opcode::LoadF32
            | Opcode::LoadF64
            | Opcode::LoadBool
            | Opcode::LoadRef => {
                let offset = self.fetch_u32()?;
                self.load_field(offset, memory::load_kind(opcode))?;
            }
            Opcode::Store8
            | Opcode::Store16
            | Opcode::Store32
            | Opcode::Store64
            | Opcode::StoreF32
            | Opcode::StoreF64
            | Opcode::StoreBool
            | Opcode::StoreRef => {
                let offset = self.fetch_u32()?;
                self.store_field(offset, memory::store_kind(opcode))?;
            }

            Opcode::LoadElem => {
                let kind = self.fetch_kind()?;
                self.load_element(kind)?;
            }
            Opcode::StoreElem => {
                let kind = self.fetch_kind()?;
                self.store_element(kind)?;
            }
            Opcode::ArrayLen => {
                let array = self.pop_object()?;
                let length = self.heap.get(array)?.array_length()?;
                self.push(Value::Int(length as i64))?;
            }

            Opcode::IAdd
            | Opcode::ISub
            | Opcode::IMul
            | Opcode::IDiv
            | Opcode::UDiv
            | Opcode::IRem
            | Opcode::URem
            | Opcode::IAnd
            | Opcode::IOr
            | Opcode::IXor
            | Opcode::IShl
            | Opcode::IShr
            | Opcode::UShr => self.int_binary(opcode)?,
            Opcode::INeg => {
                let v = self.pop_int()?;
                self.push(Value::Int(v.wrapping_neg()))?;
            }
            Opcode::INot => {
                let v = self.pop_int()?;
                self.push(Value::Int(!v))?;
            }

            Opcode::F64Add
            | Opcode::F64Sub
            | Opcode::F64Mul
            | Opcode::F64Div
            | Opcode::F64Rem
            | Opcode::F32Add
            | Opcode::F32Sub
            | Opcode::F32Mul
            | Opcode::F32Div
            | Opcode::F32Rem => self.float_binary(opcode)?,
            Opcode::F64Neg | Opcode::F32Neg => {
                let v = self.pop_float()?;
                self.push(Value::Float(-v))?;
            }

            Opcode::Eq | Opcode::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                let same = a.same(&b);
                self.push(Value::Bool(if opcode == Opcode::Eq { same } else { !same }))?;
            }
            Opcode::ILt
            | Opcode::ILe
            | Opcode::IGt
            | Opcode::IGe
            | Opcode::ULt
            | Opcode::ULe
            | Opcode::UGt
            | Opcode::UGe
            | Opcode::FLt
            | Opcode::FLe
            | Opcode::FGt
            | Opcode::FGe => self.compare(opcode)?,
            Opcode::Not => {
                let v = self.pop_bool()?;
                self.push(Value::Bool(!v))?;
            }

            Opcode::IntToF64 | Opcode::UIntToF64 | Opcode::IntToF32 | Opcode::UIntToF32 => self.convert(opcode)?,

            Opcode::StrConcat => self.concat()?,
            Opcode::IntToStr | Opcode::UIntToStr => self.int_to_string(opcode == Opcode::IntToStr)?,
            Opcode::StrEq | Opcode::StrNe => {
                let equal = self.strings_equal()?;
                self.push(Value::Bool(if opcode == Opcode::StrEq { equal } else { !equal }))?;
            }

            Opcode::Jump => self.ip = self.jump_target()?,
            Opcode::JumpIfFalse | Opcode::JumpIfTrue => {
                let target = self.jump_target()?;
                let condition = self.pop_bool()?;
                if condition == (opcode == Opcode::JumpIfTrue) {
                    self.ip = target;
                }
            }

            Opcode::Call => {
                let address = self.fetch_u64()?;
                let argc = self.fetch_u8()?;
                self.call(address, argc)?;
            }
            Opcode::CallIndirect => {
                let argc = self.fetch_u8()?;
                let address = self.pop_int()?;
                self.call(address as u64, argc)?;
            }
            Opcode::Return => {
                let value = self.pop()?;
                return self.return_from(Some(value));
            }
            Opcode::ReturnVoid => return self.return_from(None),
            Opcode::NativeCall => {
                let index = self.fetch_u32()?;
                self.native_call(index)?;
            }

            Opcode::New | Opcode::InterfaceNew => {
                let layout = self.fetch_u32()?;
                self.new_object(layout)?;
            }
            Opcode::Array => {
                let layout = self.fetch_u32()?;
                self.new_array(layout)?;
            }
            Opcode::MakeUnion => {
                let layout = self.fetch_u32()?;
                let tag = self.fetch_u32()?;
                self.make_union(layout, tag)?;
            }
            Opcode::IsTag => {
                let tag = self.fetch_u32()?;
                let union = self.pop_object()?;
                let current = self.heap.get(union)?.read_u64(0)?;
                self.push(Value::Bool(current == u64::from(tag)))?;
            }
            Opcode::UnionPayload => {
                let kind = self.fetch_kind()?;
                self.union_payload(kind)?;
            }
            Opcode::UnionEq => {
                let layout = self.fetch_u32()?;
                let strings = self.fetch_u32()?;
                let equal = self.unions_equal(layout, strings)?;
                self.push(Value::Bool(equal))?;
            }
        }
        Ok(OpcodeResult::Continue)
    }

    fn push_constant(&mut self, index: u32) -> VmResult<()> {
        if let Some(Constant::String(_)) = self.chunk.constants.get(index) {
            self.reserve_allocation()?;
        }
        let value = match self.chunk.constants.get(index) {
            Some(Constant::String(s)) => Value::Object(self.heap.allocate_string(STRING_LAYOUT, s.as_bytes())),
            Some(Constant::F32(v)) => Value::Float(f64::from(*v)),
            Some(Constant::F64(v)) => Value::Float(*v),
            Some(Constant::Bool(v)) => Value::Bool(*v),
            Some(Constant::Null) => Value::Null,
            Some(constant) => match constant.as_u64() {
                Some(bits) => Value::Int(bits as i64),
                None => return Err(VmError::CorruptChunk(format!("unsupported constant {}", constant))),
            },
            None => return Err(VmError::CorruptChunk(format!("constant index {} out of range", index))),
        };
        self.push(value)
    }

    fn call(&mut self, address: u64, argc: u8) -> VmResult<()> {
        let target = usize::try_from(address)
            .ok()
            .filter(|a| *a < self.chunk.code.len())
            .ok_or_else(|| VmError::CorruptChunk(format!("call to address {} outside the code", address)))?;
        if self.frames.depth() >= MAX_CALL_DEPTH {
            return Err(VmError::StackOverflow);
        }
        self.scratch.clear();
        let caller = self.frames.current()?;
        self.scratch.extend(caller.pop_n(argc as usize)?);
        self.frames.push(self.ip, self.scratch.drain(..));
        self.ip = target;
        Ok(())
    }

    fn return_from(&mut self, value: Option<Value>) -> VmResult<OpcodeResult> {
        let return_ip = self.frames.pop()?;
        if self.frames.is_empty() {
            return Ok(OpcodeResult::Halt(value.unwrap_or(Value::Null)));
        }
        if let Some(value) = value {
            self.push(value)?;
        }
        self.ip = return_ip;
        Ok(OpcodeResult::Continue)
    }
}
