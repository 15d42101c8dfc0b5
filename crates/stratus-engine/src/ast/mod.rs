//! Resolved syntax tree
//!
//! This is the input to the type checker. Name resolution has already run:
//! identifiers point at declarations through [`DeclRef`], and declarations
//! live in per-kind arenas on [`Module`] indexed by typed ids.
//!
//! The checker annotates the tree in place (expression types, resolved
//! references, coercion nodes) and the compiler reads the annotated tree.

pub mod build;
mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;

use crate::diagnostic::Span;
use crate::types::TypeId;

macro_rules! decl_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

decl_id!(
    /// Index into [`Module::functions`]
    FunctionId
);
decl_id!(
    /// Index into [`Module::classes`]
    ClassId
);
decl_id!(
    /// Index into [`Module::interfaces`]
    InterfaceId
);
decl_id!(
    /// Index into [`Module::enums`]
    EnumId
);
decl_id!(
    /// Index into [`Module::aliases`]
    AliasId
);
decl_id!(
    /// Index into [`Module::foreign_functions`]
    ForeignId
);
decl_id!(
    /// Index into [`FunctionDecl::locals`]; parameters come first
    LocalId
);

/// Type syntax after name resolution
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Void,
    Null,
    Bool,
    Int { signed: bool, width: u8 },
    Float { width: u8 },
    Pointer,
    String,
    Class { class: ClassId, args: Vec<TypeExpr> },
    Interface(InterfaceId),
    Enum(EnumId),
    Alias(AliasId),
    /// Generic parameter of the enclosing class, by position
    Param(u32),
    Array(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Function { params: Vec<TypeExpr>, ret: Box<TypeExpr> },
    /// Placeholder left behind by an earlier failed phase
    Invalid,
}

impl TypeExpr {
    pub const I8: TypeExpr = TypeExpr::Int { signed: true, width: 8 };
    pub const I16: TypeExpr = TypeExpr::Int { signed: true, width: 16 };
    pub const I32: TypeExpr = TypeExpr::Int { signed: true, width: 32 };
    pub const I64: TypeExpr = TypeExpr::Int { signed: true, width: 64 };
    pub const U8: TypeExpr = TypeExpr::Int { signed: false, width: 8 };
    pub const U16: TypeExpr = TypeExpr::Int { signed: false, width: 16 };
    pub const U32: TypeExpr = TypeExpr::Int { signed: false, width: 32 };
    pub const U64: TypeExpr = TypeExpr::Int { signed: false, width: 64 };
    pub const F32: TypeExpr = TypeExpr::Float { width: 32 };
    pub const F64: TypeExpr = TypeExpr::Float { width: 64 };

    pub fn class(class: ClassId) -> Self {
        TypeExpr::Class { class, args: Vec::new() }
    }

    pub fn generic(class: ClassId, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Class { class, args }
    }

    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element))
    }

    pub fn union(members: Vec<TypeExpr>) -> Self {
        TypeExpr::Union(members)
    }

    pub fn function(params: Vec<TypeExpr>, ret: TypeExpr) -> Self {
        TypeExpr::Function { params, ret: Box::new(ret) }
    }
}

/// A whole compilation unit
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Source path used in diagnostics
    pub path: String,
    pub functions: Vec<FunctionDecl>,
    pub classes: Vec<ClassDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub enums: Vec<EnumDecl>,
    pub aliases: Vec<AliasDecl>,
    pub foreign_functions: Vec<ForeignDecl>,
}

impl Module {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDecl {
        &self.functions[id.index()]
    }

    pub fn class(&self, id: ClassId) -> &ClassDecl {
        &self.classes[id.index()]
    }

    pub fn interface(&self, id: InterfaceId) -> &InterfaceDecl {
        &self.interfaces[id.index()]
    }

    pub fn enumeration(&self, id: EnumId) -> &EnumDecl {
        &self.enums[id.index()]
    }

    pub fn foreign(&self, id: ForeignId) -> &ForeignDecl {
        &self.foreign_functions[id.index()]
    }

    /// Look up the free function named `main`
    pub fn main_function(&self) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.kind == FunctionKind::Free && f.name == "main")
            .map(|i| FunctionId(i as u32))
    }
}

/// What a function declaration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    Method(ClassId),
    Constructor(ClassId),
}

impl FunctionKind {
    pub fn owner(self) -> Option<ClassId> {
        match self {
            FunctionKind::Free => None,
            FunctionKind::Method(class) | FunctionKind::Constructor(class) => Some(class),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub local: LocalId,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub kind: FunctionKind,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    /// Every local of the function, parameters first
    pub locals: Vec<LocalDecl>,
    pub body: Block,
    pub span: Span,
    /// Declared type of each local, filled in by the checker
    pub local_types: Vec<TypeId>,
}

impl FunctionDecl {
    pub fn local_name(&self, local: LocalId) -> &str {
        self.locals
            .get(local.index())
            .map(|l| l.name.as_str())
            .unwrap_or("<local>")
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub generic_params: Vec<String>,
    pub fields: Vec<FieldDecl>,
    /// Methods, including operator methods named after their token (`+`, `[]`, ...)
    pub methods: Vec<FunctionId>,
    pub constructors: Vec<FunctionId>,
    pub span: Span,
}

impl ClassDecl {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceMethodDecl {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub return_type: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<InterfaceMethodDecl>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub elements: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: String,
    pub aliased: TypeExpr,
    pub span: Span,
}

/// A C function resolved by symbol name when the VM starts
#[derive(Debug, Clone)]
pub struct ForeignDecl {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub return_type: TypeExpr,
    pub span: Span,
}
