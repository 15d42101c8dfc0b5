//! Core type definitions for the Stratus type lattice

use crate::ast::{AliasId, ClassId, EnumId, FunctionId, InterfaceId};
use rustc_hash::FxHashMap;
use std::fmt;

/// Unique identifier for a type in the type context
///
/// Types are interned, so two `TypeId`s are equal exactly when the types
/// they name are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    // Pre-interned types, in the order `TypeContext::new` creates them.
    pub const INVALID: TypeId = TypeId(0);
    pub const VOID: TypeId = TypeId(1);
    pub const NULL: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const I8: TypeId = TypeId(4);
    pub const I16: TypeId = TypeId(5);
    pub const I32: TypeId = TypeId(6);
    pub const I64: TypeId = TypeId(7);
    pub const U8: TypeId = TypeId(8);
    pub const U16: TypeId = TypeId(9);
    pub const U32: TypeId = TypeId(10);
    pub const U64: TypeId = TypeId(11);
    pub const F32: TypeId = TypeId(12);
    pub const F64: TypeId = TypeId(13);
    pub const POINTER: TypeId = TypeId(14);
    pub const TYPE_OF_TYPES: TypeId = TypeId(15);
    pub const STRING: TypeId = TypeId(16);
    pub const STRING_ARRAY: TypeId = TypeId(17);

    /// Create a new TypeId from a raw value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Represents a type in the lattice
#[derive(Debug, Clone)]
pub enum Type {
    /// Result of a failed check; suppresses follow-up errors
    Invalid,
    Void,
    Null,
    Bool,
    Int(IntType),
    Float(FloatType),
    /// Raw native address
    Pointer,
    /// Type of type-valued expressions
    TypeOfTypes,
    Class(ClassType),
    Interface(InterfaceType),
    Union(UnionType),
    Array(ArrayType),
    Function(FunctionType),
    Enum(EnumType),
    Alias(AliasType),
    /// Generic parameter of a class, only assignable to itself
    TypeParam(TypeParamType),
}

impl Type {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Int(_) | Type::Float(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntType {
    pub signed: bool,
    /// Width in bits: 8, 16, 32 or 64
    pub width: u8,
}

impl IntType {
    pub fn bytes(self) -> u32 {
        u32::from(self.width / 8)
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.signed { "i" } else { "u" }, self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatType {
    /// Width in bits: 32 or 64
    pub width: u8,
}

/// A field of a class or interface
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

/// A method or constructor of a class
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub function: FunctionId,
    /// Function type of the method, excluding the receiver
    pub signature: TypeId,
}

/// Class type
///
/// Declared classes are keyed by their declaration and generic arguments,
/// so members can be attached after interning.
#[derive(Debug, Clone)]
pub struct ClassType {
    /// Declaring class; `None` for built-in classes such as `string`
    pub decl: Option<ClassId>,
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub constructors: Vec<Method>,
    /// Type parameters of a generic declaration
    pub generic_params: Vec<TypeId>,
    /// Arguments of a reified instance
    pub generic_args: Vec<TypeId>,
    /// The generic class this instance was reified from
    pub generic_base: Option<TypeId>,
    /// Reified instances of a generic declaration, by argument tuple
    pub reified_instances: FxHashMap<Vec<TypeId>, TypeId>,
}

impl ClassType {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Method> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMethod {
    pub name: String,
    pub signature: TypeId,
}

#[derive(Debug, Clone)]
pub struct InterfaceType {
    pub decl: InterfaceId,
    pub name: String,
    pub methods: Vec<InterfaceMethod>,
    pub fields: Vec<Field>,
}

impl InterfaceType {
    pub fn method_slot(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }

    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Tagged union; members are flattened, deduplicated and sorted by id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnionType {
    pub members: Vec<TypeId>,
}

impl UnionType {
    /// Runtime tag of a member: its position in the canonical ordering
    pub fn tag_of(&self, member: TypeId) -> Option<u32> {
        self.members.iter().position(|m| *m == member).map(|i| i as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub decl: EnumId,
    pub name: String,
    pub elements: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AliasType {
    pub decl: AliasId,
    pub name: String,
    pub aliased: TypeId,
}

#[derive(Debug, Clone)]
pub struct TypeParamType {
    pub owner: ClassId,
    pub index: u32,
    pub name: String,
}

/// Interning key: constituents for structural types, declarations for nominal ones
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    Invalid,
    Void,
    Null,
    Bool,
    Int(IntType),
    Float(FloatType),
    Pointer,
    TypeOfTypes,
    BuiltinClass(String),
    Class(ClassId, Vec<TypeId>),
    Interface(InterfaceId),
    Union(Vec<TypeId>),
    Array(TypeId),
    Function(Vec<TypeId>, TypeId),
    Enum(EnumId),
    Alias(AliasId),
    TypeParam(ClassId, u32),
}

impl TypeKey {
    pub(crate) fn of(ty: &Type) -> TypeKey {
        match ty {
            Type::Invalid => TypeKey::Invalid,
            Type::Void => TypeKey::Void,
            Type::Null => TypeKey::Null,
            Type::Bool => TypeKey::Bool,
            Type::Int(i) => TypeKey::Int(*i),
            Type::Float(f) => TypeKey::Float(*f),
            Type::Pointer => TypeKey::Pointer,
            Type::TypeOfTypes => TypeKey::TypeOfTypes,
            Type::Class(c) => match c.decl {
                Some(decl) => TypeKey::Class(decl, c.generic_args.clone()),
                None => TypeKey::BuiltinClass(c.name.clone()),
            },
            Type::Interface(i) => TypeKey::Interface(i.decl),
            Type::Union(u) => TypeKey::Union(u.members.clone()),
            Type::Array(a) => TypeKey::Array(a.element),
            Type::Function(f) => TypeKey::Function(f.params.clone(), f.return_type),
            Type::Enum(e) => TypeKey::Enum(e.decl),
            Type::Alias(a) => TypeKey::Alias(a.decl),
            Type::TypeParam(p) => TypeKey::TypeParam(p.owner, p.index),
        }
    }
}
