//! Expression nodes

use super::{EnumId, ForeignId, FunctionId, LocalId, TypeExpr};
use crate::diagnostic::Span;
use crate::types::{Implementation, TypeId};
use std::sync::Arc;

/// What an expression refers to once resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclRef {
    Local(LocalId),
    Function(FunctionId),
    Foreign(ForeignId),
    EnumElement { enumeration: EnumId, index: u32 },
    /// Class field by declaration order
    Field(u32),
    /// Interface field by slot
    InterfaceField(u32),
    /// Interface method by slot
    InterfaceMethod(u32),
}

/// An expression together with the checker's annotations
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Resolved type; `TypeId::INVALID` until checked
    pub ty: TypeId,
    pub referenced: Option<DeclRef>,
    /// Receiver supplied implicitly, e.g. `this` for a bare method call inside a class
    pub implicit_context: Option<Box<Expr>>,
    /// Overload set supplied by name resolution, narrowed to `referenced` by the checker
    pub candidates: Vec<DeclRef>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
            ty: TypeId::INVALID,
            referenced: None,
            implicit_context: None,
            candidates: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_ref(mut self, decl: DeclRef) -> Self {
        self.referenced = Some(decl);
        self
    }

    /// Value of a scalar literal
    pub fn literal(&self) -> Option<Literal> {
        match &self.kind {
            ExprKind::Int(v) => Some(Literal::Int(*v)),
            ExprKind::Float(v) => Some(Literal::Float(*v)),
            ExprKind::Bool(v) => Some(Literal::Bool(*v)),
            _ => None,
        }
    }

    pub fn is_compound_operand(&self) -> bool {
        match &self.kind {
            ExprKind::CompoundOperand => true,
            ExprKind::Coerce(c) => c.source.is_compound_operand(),
            _ => false,
        }
    }
}

/// A scalar literal value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    /// Reference to a declaration; see [`Expr::referenced`] and [`Expr::candidates`]
    Ident,
    This,
    /// A type used as a value; calling it constructs an instance
    TypeValue(TypeExpr),
    Member {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Is {
        operand: Box<Expr>,
        target: TypeExpr,
        check: IsCheck,
    },
    /// Explicit cast as written; replaced by [`ExprKind::Coerce`] during checking
    Cast {
        operand: Box<Expr>,
        target: TypeExpr,
    },
    /// Conversion inserted by the checker; the target type is the node's `ty`
    Coerce(Coercion),
    Array(Vec<Expr>),
    /// Current value of a compound assignment target
    CompoundOperand,
}

/// Runtime test selected for an `is` expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsCheck {
    Unresolved,
    /// Compare the union's tag against this member position
    UnionTag(u32),
    /// Statically known to hold
    Always,
}

#[derive(Debug, Clone)]
pub struct Coercion {
    pub source: Box<Expr>,
    pub kind: CoercionKind,
}

#[derive(Debug, Clone)]
pub enum CoercionKind {
    /// Same runtime representation: int widening, aliases, pointers
    Identity,
    IntToFloat,
    /// Box a member value into a union with this tag
    UnionWrap { tag: u32 },
    /// Read the payload of a union whose tag is statically known
    UnionNarrow { tag: u32 },
    /// Build an interface object bound to a class instance
    ToInterface(Arc<Implementation>),
    /// Render an integer for string concatenation
    IntToString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Families of binary operators that share typing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    Arithmetic,
    Comparison,
    Equality,
    Logical,
    Bitwise,
}

impl BinaryOp {
    /// Source token, also the name of a user-defined operator method
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    pub fn family(self) -> OperatorFamily {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                OperatorFamily::Arithmetic
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => OperatorFamily::Comparison,
            BinaryOp::Eq | BinaryOp::Ne => OperatorFamily::Equality,
            BinaryOp::And | BinaryOp::Or => OperatorFamily::Logical,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
                OperatorFamily::Bitwise
            }
        }
    }

    /// Whether the result is `bool` rather than the operand type
    pub fn yields_bool(self) -> bool {
        matches!(
            self.family(),
            OperatorFamily::Comparison | OperatorFamily::Equality | OperatorFamily::Logical
        )
    }
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}
