//! Runtime memory layouts
//!
//! Every heap-allocated type gets a [`RuntimeLayout`] computed once and
//! cached by `TypeId`. The layout tells the VM where each value lives in
//! an object's bytes and, for the collector, which slots hold references.
//!
//! Rules:
//! - classes lay out fields in declaration order, each aligned to its size
//! - arrays carry an 8-byte length header followed by packed elements
//! - unions are `{tag: u64, payload: u64}`
//! - interfaces are `{receiver, method addresses..., field copies...}`
//! - object and array references are 8 bytes whatever their referent

use super::bytecode::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use super::error::CompileError;
use crate::types::{Type, TypeContext, TypeId};
use rustc_hash::FxHashMap;

/// Layout index reserved for `string`
pub const STRING_LAYOUT: u32 = 0;
/// Layout index reserved for `string[]`, the entry point's argument array
pub const STRING_ARRAY_LAYOUT: u32 = 1;

/// Size of the array length header
pub const ARRAY_HEADER: u32 = 8;
/// Offset of the payload in a union box
pub const UNION_PAYLOAD: u32 = 8;
/// Offset of the first method slot in an interface object
pub const INTERFACE_METHODS: u32 = 8;

/// Storage class of one value slot
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    I8 = 0x01,
    I16 = 0x02,
    I32 = 0x03,
    I64 = 0x04,
    U8 = 0x05,
    U16 = 0x06,
    U32 = 0x07,
    U64 = 0x08,
    F32 = 0x09,
    F64 = 0x0A,
    Bool = 0x0B,
    /// Heap reference, stored as handle + 1 with 0 for null
    Ref = 0x0C,
    /// Always null; occupies a reference-sized slot
    Null = 0x0D,
}

impl SlotKind {
    pub fn from_u8(byte: u8) -> Option<SlotKind> {
        Some(match byte {
            0x01 => SlotKind::I8,
            0x02 => SlotKind::I16,
            0x03 => SlotKind::I32,
            0x04 => SlotKind::I64,
            0x05 => SlotKind::U8,
            0x06 => SlotKind::U16,
            0x07 => SlotKind::U32,
            0x08 => SlotKind::U64,
            0x09 => SlotKind::F32,
            0x0A => SlotKind::F64,
            0x0B => SlotKind::Bool,
            0x0C => SlotKind::Ref,
            0x0D => SlotKind::Null,
            _ => return None,
        })
    }

    /// Size in bytes; also the alignment
    pub fn size(self) -> u32 {
        match self {
            SlotKind::I8 | SlotKind::U8 | SlotKind::Bool => 1,
            SlotKind::I16 | SlotKind::U16 => 2,
            SlotKind::I32 | SlotKind::U32 | SlotKind::F32 => 4,
            SlotKind::I64 | SlotKind::U64 | SlotKind::F64 | SlotKind::Ref | SlotKind::Null => 8,
        }
    }

    pub fn is_ref(self) -> bool {
        self == SlotKind::Ref
    }

    pub fn is_float(self) -> bool {
        matches!(self, SlotKind::F32 | SlotKind::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            SlotKind::I8 => "i8",
            SlotKind::I16 => "i16",
            SlotKind::I32 => "i32",
            SlotKind::I64 => "i64",
            SlotKind::U8 => "u8",
            SlotKind::U16 => "u16",
            SlotKind::U32 => "u32",
            SlotKind::U64 => "u64",
            SlotKind::F32 => "f32",
            SlotKind::F64 => "f64",
            SlotKind::Bool => "bool",
            SlotKind::Ref => "ref",
            SlotKind::Null => "null",
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<SlotKind, DecodeError> {
        let tag = reader.read_u8()?;
        SlotKind::from_u8(tag).ok_or(DecodeError::InvalidTag { what: "slot kind", tag })
    }
}

/// Round `offset` up to a multiple of `align`
pub fn align_to(offset: u32, align: u32) -> u32 {
    offset.div_ceil(align) * align
}

/// A slot at a fixed byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub offset: u32,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutKind {
    Class { fields: Vec<FieldSlot> },
    Array { element: SlotKind, stride: u32 },
    /// Payload kind for each member tag
    Union { members: Vec<SlotKind> },
    Interface { methods: u32, fields: Vec<FieldSlot> },
}

/// Compiled layout of a heap type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    pub name: String,
    pub kind: LayoutKind,
    /// Fixed size in bytes; for arrays, the header only
    pub size: u32,
    pub align: u32,
}

impl RuntimeLayout {
    fn class(name: String, kinds: &[SlotKind]) -> Self {
        let (fields, size, align) = pack(0, 1, kinds);
        Self {
            name,
            kind: LayoutKind::Class { fields },
            size,
            align,
        }
    }

    fn array(name: String, element: SlotKind) -> Self {
        Self {
            name,
            kind: LayoutKind::Array {
                element,
                stride: element.size(),
            },
            size: ARRAY_HEADER,
            align: 8,
        }
    }

    fn union(name: String, members: Vec<SlotKind>) -> Self {
        Self {
            name,
            kind: LayoutKind::Union { members },
            size: 16,
            align: 8,
        }
    }

    fn interface(name: String, methods: u32, field_kinds: &[SlotKind]) -> Self {
        let start = INTERFACE_METHODS + 8 * methods;
        let (fields, size, align) = pack(start, 8, field_kinds);
        Self {
            name,
            kind: LayoutKind::Interface { methods, fields },
            size,
            align,
        }
    }

    /// Bytes needed for an object of this layout with `length` elements
    pub fn allocation_size(&self, length: u64) -> Option<usize> {
        match self.kind {
            LayoutKind::Array { stride, .. } => u64::from(stride)
                .checked_mul(length)?
                .checked_add(u64::from(self.size))
                .and_then(|n| usize::try_from(n).ok()),
            _ => Some(self.size as usize),
        }
    }

    /// Offsets of reference slots in a fixed-size object
    pub fn reference_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        let fields: &[FieldSlot] = match &self.kind {
            LayoutKind::Class { fields } | LayoutKind::Interface { fields, .. } => fields,
            _ => &[],
        };
        let receiver = matches!(self.kind, LayoutKind::Interface { .. }).then_some(0);
        receiver
            .into_iter()
            .chain(fields.iter().filter(|f| f.kind.is_ref()).map(|f| f.offset))
    }

    pub fn field(&self, index: usize) -> Option<FieldSlot> {
        match &self.kind {
            LayoutKind::Class { fields } | LayoutKind::Interface { fields, .. } => fields.get(index).copied(),
            _ => None,
        }
    }

    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u32(self.size);
        writer.emit_u32(self.align);
        let encode_fields = |writer: &mut BytecodeWriter, fields: &[FieldSlot]| {
            writer.emit_u32(fields.len() as u32);
            for field in fields {
                writer.emit_u32(field.offset);
                writer.emit_u8(field.kind as u8);
            }
        };
        match &self.kind {
            LayoutKind::Class { fields } => {
                writer.emit_u8(0);
                encode_fields(writer, fields);
            }
            LayoutKind::Array { element, stride } => {
                writer.emit_u8(1);
                writer.emit_u8(*element as u8);
                writer.emit_u32(*stride);
            }
            LayoutKind::Union { members } => {
                writer.emit_u8(2);
                writer.emit_u32(members.len() as u32);
                for member in members {
                    writer.emit_u8(*member as u8);
                }
            }
            LayoutKind::Interface { methods, fields } => {
                writer.emit_u8(3);
                writer.emit_u32(*methods);
                encode_fields(writer, fields);
            }
        }
    }

    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let size = reader.read_u32()?;
        let align = reader.read_u32()?;
        let decode_fields = |reader: &mut BytecodeReader<'_>| -> Result<Vec<FieldSlot>, DecodeError> {
            let count = reader.read_u32()?;
            (0..count)
                .map(|_| {
                    let offset = reader.read_u32()?;
                    let kind = SlotKind::decode(reader)?;
                    Ok(FieldSlot { offset, kind })
                })
                .collect()
        };
        let kind = match reader.read_u8()? {
            0 => LayoutKind::Class {
                fields: decode_fields(reader)?,
            },
            1 => LayoutKind::Array {
                element: SlotKind::decode(reader)?,
                stride: reader.read_u32()?,
            },
            2 => {
                let count = reader.read_u32()?;
                let members = (0..count)
                    .map(|_| SlotKind::decode(reader))
                    .collect::<Result<_, _>>()?;
                LayoutKind::Union { members }
            }
            3 => {
                let methods = reader.read_u32()?;
                LayoutKind::Interface {
                    methods,
                    fields: decode_fields(reader)?,
                }
            }
            tag => return Err(DecodeError::InvalidTag { what: "layout", tag }),
        };
        Ok(Self { name, kind, size, align })
    }
}

/// Place slots one after another from `start`, each at its natural alignment
fn pack(start: u32, min_align: u32, kinds: &[SlotKind]) -> (Vec<FieldSlot>, u32, u32) {
    let mut offset = start;
    let mut align = min_align;
    let mut fields = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let size = kind.size();
        offset = align_to(offset, size);
        fields.push(FieldSlot { offset, kind });
        offset += size;
        align = align.max(size);
    }
    (fields, align_to(offset, align), align)
}

/// Type-to-layout cache shared by the whole compilation
#[derive(Debug, Clone)]
pub struct LayoutCache {
    layouts: Vec<RuntimeLayout>,
    by_type: FxHashMap<TypeId, u32>,
}

impl LayoutCache {
    pub fn new() -> Self {
        let mut cache = Self {
            layouts: Vec::new(),
            by_type: FxHashMap::default(),
        };
        cache.insert(TypeId::STRING, RuntimeLayout::array("string".into(), SlotKind::U8));
        cache.insert(
            TypeId::STRING_ARRAY,
            RuntimeLayout::array("string[]".into(), SlotKind::Ref),
        );
        cache
    }

    fn insert(&mut self, ty: TypeId, layout: RuntimeLayout) -> u32 {
        let index = self.layouts.len() as u32;
        self.layouts.push(layout);
        self.by_type.insert(ty, index);
        index
    }

    pub fn get(&self, index: u32) -> Option<&RuntimeLayout> {
        self.layouts.get(index as usize)
    }

    pub fn into_layouts(self) -> Vec<RuntimeLayout> {
        self.layouts
    }

    /// Layout index of a heap type, computing it on first use
    pub fn layout_of(&mut self, ctx: &TypeContext, ty: TypeId) -> Result<u32, CompileError> {
        let ty = ctx.unalias(ty);
        if let Some(&index) = self.by_type.get(&ty) {
            return Ok(index);
        }
        let name = ctx.display(ty);
        let layout = match ctx.get(ty) {
            Type::Class(class) => {
                let kinds = class
                    .fields
                    .iter()
                    .map(|f| slot_kind(ctx, f.ty))
                    .collect::<Result<Vec<_>, _>>()?;
                RuntimeLayout::class(name, &kinds)
            }
            Type::Array(array) => RuntimeLayout::array(name, slot_kind(ctx, array.element)?),
            Type::Union(union) => {
                let members = union
                    .members
                    .iter()
                    .map(|m| slot_kind(ctx, *m))
                    .collect::<Result<Vec<_>, _>>()?;
                RuntimeLayout::union(name, members)
            }
            Type::Interface(iface) => {
                let kinds = iface
                    .fields
                    .iter()
                    .map(|f| slot_kind(ctx, f.ty))
                    .collect::<Result<Vec<_>, _>>()?;
                RuntimeLayout::interface(name, iface.methods.len() as u32, &kinds)
            }
            _ => return Err(CompileError::UnsizedType { ty: name }),
        };
        log::trace!("layout {} = {:?}", self.layouts.len(), layout);
        Ok(self.insert(ty, layout))
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage class of a value of type `ty`
pub fn slot_kind(ctx: &TypeContext, ty: TypeId) -> Result<SlotKind, CompileError> {
    Ok(match ctx.resolved(ty) {
        Type::Bool => SlotKind::Bool,
        Type::Null => SlotKind::Null,
        Type::Int(int) => match (int.signed, int.width) {
            (true, 8) => SlotKind::I8,
            (true, 16) => SlotKind::I16,
            (true, 32) => SlotKind::I32,
            (true, _) => SlotKind::I64,
            (false, 8) => SlotKind::U8,
            (false, 16) => SlotKind::U16,
            (false, 32) => SlotKind::U32,
            (false, _) => SlotKind::U64,
        },
        Type::Float(float) if float.width == 32 => SlotKind::F32,
        Type::Float(_) => SlotKind::F64,
        Type::Enum(_) => SlotKind::I64,
        Type::Pointer | Type::Function(_) => SlotKind::U64,
        Type::Class(_) | Type::Interface(_) | Type::Union(_) | Type::Array(_) => SlotKind::Ref,
        Type::Void | Type::Invalid | Type::TypeParam(_) | Type::TypeOfTypes | Type::Alias(_) => {
            return Err(CompileError::UnsizedType { ty: ctx.display(ty) })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassId, InterfaceId};
    use crate::types::{Field, InterfaceMethod};

    fn field(name: &str, ty: TypeId) -> Field {
        Field { name: name.into(), ty }
    }

    #[test]
    fn test_class_fields_are_aligned_in_declaration_order() {
        let mut ctx = TypeContext::new();
        let class = ctx.declare_class(ClassId(0), "Mixed", &[]);
        ctx.define_class(
            class,
            vec![
                field("a", TypeId::U8),
                field("b", TypeId::I64),
                field("c", TypeId::I16),
                field("d", TypeId::STRING),
            ],
            vec![],
            vec![],
        );

        let mut cache = LayoutCache::new();
        let index = cache.layout_of(&ctx, class).unwrap();
        let layout = cache.get(index).unwrap();
        let offsets: Vec<u32> = (0..4).map(|i| layout.field(i).unwrap().offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 24]);
        assert_eq!(layout.size, 32);
        assert_eq!(layout.align, 8);
        assert_eq!(layout.reference_offsets().collect::<Vec<_>>(), vec![24]);
    }

    #[test]
    fn test_reserved_string_layouts() {
        let mut ctx = TypeContext::new();
        let mut cache = LayoutCache::new();
        assert_eq!(cache.layout_of(&ctx, TypeId::STRING).unwrap(), STRING_LAYOUT);
        assert_eq!(cache.layout_of(&ctx, TypeId::STRING_ARRAY).unwrap(), STRING_ARRAY_LAYOUT);

        let ints = ctx.array_type(TypeId::I32);
        let index = cache.layout_of(&ctx, ints).unwrap();
        assert_eq!(index, 2);
        let layout = cache.get(index).unwrap();
        assert_eq!(layout.allocation_size(3), Some(8 + 12));
        // Cached
        assert_eq!(cache.layout_of(&ctx, ints).unwrap(), index);
    }

    #[test]
    fn test_union_and_interface_layouts() {
        let mut ctx = TypeContext::new();
        let union = ctx.union_type(vec![TypeId::I32, TypeId::STRING]);
        let iface = ctx.declare_interface(InterfaceId(0), "Sized");
        let area = ctx.function_type(vec![], TypeId::I64);
        ctx.define_interface(
            iface,
            vec![InterfaceMethod {
                name: "area".into(),
                signature: area,
            }],
            vec![field("flag", TypeId::BOOL), field("side", TypeId::I64)],
        );

        let mut cache = LayoutCache::new();
        let u = cache.layout_of(&ctx, union).unwrap();
        assert_eq!(
            cache.get(u).unwrap().kind,
            LayoutKind::Union {
                members: vec![SlotKind::I32, SlotKind::Ref]
            }
        );

        let i = cache.layout_of(&ctx, iface).unwrap();
        let layout = cache.get(i).unwrap();
        assert_eq!(layout.field(0).unwrap().offset, 16);
        assert_eq!(layout.field(1).unwrap().offset, 24);
        assert_eq!(layout.size, 32);
        assert_eq!(layout.reference_offsets().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_unsized_types_are_rejected() {
        let ctx = TypeContext::new();
        assert!(matches!(
            slot_kind(&ctx, TypeId::VOID),
            Err(CompileError::UnsizedType { .. })
        ));
        let mut cache = LayoutCache::new();
        assert!(cache.layout_of(&ctx, TypeId::I64).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let mut ctx = TypeContext::new();
        let union = ctx.union_type(vec![TypeId::F32, TypeId::NULL]);
        let mut cache = LayoutCache::new();
        cache.layout_of(&ctx, union).unwrap();

        let mut writer = BytecodeWriter::new();
        for layout in cache.clone().into_layouts() {
            layout.encode(&mut writer);
        }
        let bytes = writer.into_bytes();
        let mut reader = BytecodeReader::new(&bytes);
        for expected in cache.into_layouts() {
            assert_eq!(RuntimeLayout::decode(&mut reader).unwrap(), expected);
        }
        assert!(reader.is_at_end());
    }
}
