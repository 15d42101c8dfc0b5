//! Object heap
//!
//! Objects live in a slot table indexed by [`ObjectRef`]. Each object owns
//! its bytes and names its layout by index into the chunk's layout table,
//! so scanning never reinterprets bytes as pointers.

use crate::compiler::layout::{SlotKind, ARRAY_HEADER};
use crate::vm::value::{ObjectRef, Value};
use crate::vm::{VmError, VmResult};

/// A GC-managed allocation
#[derive(Debug)]
pub struct HeapObject {
    pub marked: bool,
    /// Index into the chunk's layout table
    pub layout: u32,
    pub data: Box<[u8]>,
}

impl HeapObject {
    fn bytes(&self, offset: u32, len: usize) -> VmResult<&[u8]> {
        let start = offset as usize;
        self.data
            .get(start..start + len)
            .ok_or_else(|| VmError::CorruptChunk(format!("access at offset {} outside object", offset)))
    }

    fn bytes_mut(&mut self, offset: u32, len: usize) -> VmResult<&mut [u8]> {
        let start = offset as usize;
        self.data
            .get_mut(start..start + len)
            .ok_or_else(|| VmError::CorruptChunk(format!("access at offset {} outside object", offset)))
    }

    fn read<const N: usize>(&self, offset: u32) -> VmResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub fn read_u64(&self, offset: u32) -> VmResult<u64> {
        Ok(u64::from_le_bytes(self.read(offset)?))
    }

    pub fn write_u64(&mut self, offset: u32, value: u64) -> VmResult<()> {
        self.bytes_mut(offset, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Reference stored at `offset`, if any
    pub fn read_ref(&self, offset: u32) -> VmResult<Option<ObjectRef>> {
        Ok(ObjectRef::from_bits(self.read_u64(offset)?))
    }

    /// Read a slot as a stack value
    pub fn read_slot(&self, offset: u32, kind: SlotKind) -> VmResult<Value> {
        Ok(match kind {
            SlotKind::I8 => Value::Int(i64::from(i8::from_le_bytes(self.read(offset)?))),
            SlotKind::I16 => Value::Int(i64::from(i16::from_le_bytes(self.read(offset)?))),
            SlotKind::I32 => Value::Int(i64::from(i32::from_le_bytes(self.read(offset)?))),
            SlotKind::I64 | SlotKind::U64 => Value::Int(i64::from_le_bytes(self.read(offset)?)),
            SlotKind::U8 => Value::Int(i64::from(u8::from_le_bytes(self.read(offset)?))),
            SlotKind::U16 => Value::Int(i64::from(u16::from_le_bytes(self.read(offset)?))),
            SlotKind::U32 => Value::Int(i64::from(u32::from_le_bytes(self.read(offset)?))),
            SlotKind::F32 => Value::Float(f64::from(f32::from_le_bytes(self.read(offset)?))),
            SlotKind::F64 => Value::Float(f64::from_le_bytes(self.read(offset)?)),
            SlotKind::Bool => Value::Bool(self.read::<1>(offset)?[0] != 0),
            SlotKind::Ref => match self.read_ref(offset)? {
                Some(r) => Value::Object(r),
                None => Value::Null,
            },
            SlotKind::Null => Value::Null,
        })
    }

    /// Store a stack value into a slot, truncating integers to the slot width
    pub fn write_slot(&mut self, offset: u32, kind: SlotKind, value: Value) -> VmResult<()> {
        match (kind, value) {
            (SlotKind::I8 | SlotKind::U8, Value::Int(v)) => self.bytes_mut(offset, 1)?[0] = v as u8,
            (SlotKind::I16 | SlotKind::U16, Value::Int(v)) => {
                self.bytes_mut(offset, 2)?.copy_from_slice(&(v as u16).to_le_bytes())
            }
            (SlotKind::I32 | SlotKind::U32, Value::Int(v)) => {
                self.bytes_mut(offset, 4)?.copy_from_slice(&(v as u32).to_le_bytes())
            }
            (SlotKind::I64 | SlotKind::U64, Value::Int(v)) => self.write_u64(offset, v as u64)?,
            (SlotKind::F32, Value::Float(v)) => {
                self.bytes_mut(offset, 4)?.copy_from_slice(&(v as f32).to_le_bytes())
            }
            (SlotKind::F64, Value::Float(v)) => self.bytes_mut(offset, 8)?.copy_from_slice(&v.to_le_bytes()),
            (SlotKind::Bool, Value::Bool(v)) => self.bytes_mut(offset, 1)?[0] = u8::from(v),
            (SlotKind::Ref, Value::Object(r)) => self.write_u64(offset, r.to_bits())?,
            (SlotKind::Ref | SlotKind::Null, Value::Null) => self.write_u64(offset, 0)?,
            (kind, value) => {
                return Err(VmError::TypeMismatch {
                    expected: kind.name(),
                    found: value.type_name(),
                })
            }
        }
        Ok(())
    }

    /// Element count of an array object
    pub fn array_length(&self) -> VmResult<u64> {
        self.read_u64(0)
    }

    /// Offset of element `index`, checked against the array length
    pub fn element_offset(&self, index: i64, stride: u32) -> VmResult<u32> {
        let length = self.array_length()?;
        match u64::try_from(index) {
            Ok(i) if i < length => u32::try_from(u64::from(ARRAY_HEADER) + i * u64::from(stride))
                .map_err(|_| VmError::IndexOutOfBounds { index, length }),
            _ => Err(VmError::IndexOutOfBounds { index, length }),
        }
    }

    /// Payload bytes of an array (elements only)
    pub fn elements(&self) -> &[u8] {
        let length = self.array_length().unwrap_or(0) as usize;
        let start = ARRAY_HEADER as usize;
        self.data.get(start..start + length).unwrap_or(&[])
    }
}

/// Slot table of live objects
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Option<HeapObject>>,
    free: Vec<u32>,
    live: usize,
    bytes: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `size` zeroed bytes with layout `layout`
    pub fn allocate(&mut self, layout: u32, size: usize) -> ObjectRef {
        let object = HeapObject {
            marked: false,
            layout,
            data: vec![0u8; size].into_boxed_slice(),
        };
        self.live += 1;
        self.bytes += size;
        match self.free.pop() {
            Some(handle) => {
                self.objects[handle as usize] = Some(object);
                ObjectRef(handle)
            }
            None => {
                self.objects.push(Some(object));
                ObjectRef(self.objects.len() as u32 - 1)
            }
        }
    }

    /// Allocate an array and write its length header
    ///
    /// One zero byte follows the elements so that byte arrays handed to
    /// native code are NUL terminated.
    pub fn allocate_array(&mut self, layout: u32, header_and_elements: usize, length: u64) -> ObjectRef {
        let r = self.allocate(layout, header_and_elements + 1);
        if let Some(object) = self.objects[r.0 as usize].as_mut() {
            object.data[..8].copy_from_slice(&length.to_le_bytes());
        }
        r
    }

    /// Allocate a string holding `bytes`
    pub fn allocate_string(&mut self, layout: u32, bytes: &[u8]) -> ObjectRef {
        let header = ARRAY_HEADER as usize;
        let r = self.allocate_array(layout, header + bytes.len(), bytes.len() as u64);
        if let Some(object) = self.objects[r.0 as usize].as_mut() {
            object.data[header..header + bytes.len()].copy_from_slice(bytes);
        }
        r
    }

    pub fn get(&self, r: ObjectRef) -> VmResult<&HeapObject> {
        self.objects
            .get(r.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(VmError::DanglingReference(r.0))
    }

    pub fn get_mut(&mut self, r: ObjectRef) -> VmResult<&mut HeapObject> {
        self.objects
            .get_mut(r.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(VmError::DanglingReference(r.0))
    }

    pub fn contains(&self, r: ObjectRef) -> bool {
        self.get(r).is_ok()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Bytes held by live objects
    pub fn allocated_bytes(&self) -> usize {
        self.bytes
    }

    /// Free every unmarked object and clear the mark on survivors
    ///
    /// Returns the number of objects freed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (handle, slot) in self.objects.iter_mut().enumerate() {
            let Some(object) = slot else { continue };
            if object.marked {
                object.marked = false;
            } else {
                self.bytes -= object.data.len();
                *slot = None;
                self.free.push(handle as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}
