//! Compile-time evaluation of literal operations
//!
//! Folding applies to a binary operator whose two operands are literals,
//! and to a unary operator or numeric conversion applied to a literal.
//! "Literal" covers a literal possibly wrapped in such a unary operator
//! or conversion. Results follow the VM's runtime semantics exactly:
//! integers wrap on 64 bits and single precision results round to f32.
//! Integer division by zero is left for the VM to report.

use super::function::FunctionContext;
use super::Compiler;
use crate::ast::*;
use crate::types::TypeId;

/// Value computed at compile time
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Folded {
    Int(i64),
    /// Value and whether it is single precision
    Float(f64, bool),
    Bool(bool),
}

/// Whether an expression is a literal for folding purposes
fn is_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Bool(_) => true,
        ExprKind::Unary { operand, .. } => is_literal(operand),
        ExprKind::Coerce(c) => {
            matches!(c.kind, CoercionKind::Identity | CoercionKind::IntToFloat) && is_literal(&c.source)
        }
        _ => false,
    }
}

fn round(value: f64, single: bool) -> f64 {
    if single {
        f64::from(value as f32)
    } else {
        value
    }
}

impl Compiler<'_> {
    /// Evaluate a foldable operation; plain literals are left to the emitter
    pub(super) fn fold(&mut self, fc: &FunctionContext, expr: &Expr) -> Option<Folded> {
        match &expr.kind {
            ExprKind::Unary { .. } | ExprKind::Coerce(_) if is_literal(expr) => self.evaluate(fc, expr),
            ExprKind::Binary { op, left, right }
                if expr.referenced.is_none()
                    && op.family() != OperatorFamily::Logical
                    && is_literal(left)
                    && is_literal(right) =>
            {
                self.evaluate(fc, expr)
            }
            _ => None,
        }
    }

    pub(super) fn push_folded(&mut self, value: Folded) {
        match value {
            Folded::Int(v) => self.push_int(v),
            Folded::Float(v, single) => self.push_float(v, single),
            Folded::Bool(v) => self.push_bool(v),
        }
    }

    fn evaluate(&mut self, fc: &FunctionContext, expr: &Expr) -> Option<Folded> {
        let ty = self.ty(fc, expr.ty);
        match &expr.kind {
            ExprKind::Int(v) => Some(Folded::Int(*v)),
            ExprKind::Float(v) => {
                let single = ty == TypeId::F32;
                Some(Folded::Float(round(*v, single), single))
            }
            ExprKind::Bool(v) => Some(Folded::Bool(*v)),
            ExprKind::Unary { op, operand } => match (op, self.evaluate(fc, operand)?) {
                (UnaryOp::Neg, Folded::Int(v)) => Some(Folded::Int(v.wrapping_neg())),
                (UnaryOp::Neg, Folded::Float(v, single)) => Some(Folded::Float(-v, single)),
                (UnaryOp::BitNot, Folded::Int(v)) => Some(Folded::Int(!v)),
                (UnaryOp::Not, Folded::Bool(v)) => Some(Folded::Bool(!v)),
                _ => None,
            },
            ExprKind::Coerce(coercion) => {
                let value = self.evaluate(fc, &coercion.source)?;
                match (&coercion.kind, value) {
                    (CoercionKind::Identity, value) => Some(value),
                    (CoercionKind::IntToFloat, Folded::Int(v)) => {
                        let source = self.ty(fc, coercion.source.ty);
                        let signed = self.ctx.int(source).map_or(true, |i| i.signed);
                        let single = ty == TypeId::F32;
                        let wide = if signed { v as f64 } else { v as u64 as f64 };
                        Some(Folded::Float(round(wide, single), single))
                    }
                    _ => None,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let operand = self.ty(fc, left.ty);
                let l = self.evaluate(fc, left)?;
                let r = self.evaluate(fc, right)?;
                self.fold_binary(*op, operand, l, r)
            }
            _ => None,
        }
    }

    fn fold_binary(&self, op: BinaryOp, operand: TypeId, l: Folded, r: Folded) -> Option<Folded> {
        use BinaryOp::*;
        match (l, r) {
            (Folded::Int(a), Folded::Int(b)) => {
                let signed = self.ctx.int(operand).map_or(true, |i| i.signed);
                let (ua, ub) = (a as u64, b as u64);
                Some(match op {
                    Add => Folded::Int(a.wrapping_add(b)),
                    Sub => Folded::Int(a.wrapping_sub(b)),
                    Mul => Folded::Int(a.wrapping_mul(b)),
                    Div | Rem if b == 0 => return None,
                    Div if signed => Folded::Int(a.wrapping_div(b)),
                    Div => Folded::Int((ua / ub) as i64),
                    Rem if signed => Folded::Int(a.wrapping_rem(b)),
                    Rem => Folded::Int((ua % ub) as i64),
                    BitAnd => Folded::Int(a & b),
                    BitOr => Folded::Int(a | b),
                    BitXor => Folded::Int(a ^ b),
                    Shl => Folded::Int(a.wrapping_shl(b as u32)),
                    Shr if signed => Folded::Int(a.wrapping_shr(b as u32)),
                    Shr => Folded::Int(ua.wrapping_shr(b as u32) as i64),
                    Eq => Folded::Bool(a == b),
                    Ne => Folded::Bool(a != b),
                    Lt if signed => Folded::Bool(a < b),
                    Le if signed => Folded::Bool(a <= b),
                    Gt if signed => Folded::Bool(a > b),
                    Ge if signed => Folded::Bool(a >= b),
                    Lt => Folded::Bool(ua < ub),
                    Le => Folded::Bool(ua <= ub),
                    Gt => Folded::Bool(ua > ub),
                    Ge => Folded::Bool(ua >= ub),
                    And | Or => return None,
                })
            }
            (Folded::Float(a, single), Folded::Float(b, _)) => Some(match op {
                Add => Folded::Float(round(a + b, single), single),
                Sub => Folded::Float(round(a - b, single), single),
                Mul => Folded::Float(round(a * b, single), single),
                Div => Folded::Float(round(a / b, single), single),
                Rem => Folded::Float(round(a % b, single), single),
                Eq => Folded::Bool(a == b),
                Ne => Folded::Bool(a != b),
                Lt => Folded::Bool(a < b),
                Le => Folded::Bool(a <= b),
                Gt => Folded::Bool(a > b),
                Ge => Folded::Bool(a >= b),
                _ => return None,
            }),
            (Folded::Bool(a), Folded::Bool(b)) => match op {
                Eq => Some(Folded::Bool(a == b)),
                Ne => Some(Folded::Bool(a != b)),
                _ => None,
            },
            _ => None,
        }
    }
}
