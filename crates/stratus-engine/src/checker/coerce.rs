//! Implicit conversions
//!
//! Every place a value flows into a typed slot goes through
//! [`TypeChecker::coerce`], which records the conversion as an explicit
//! `Coerce` node so the compiler never re-derives it.

use super::checker::TypeChecker;
use super::error::CheckError;
use crate::ast::{Coercion, CoercionKind, Expr, ExprKind};
use crate::types::TypeId;

impl TypeChecker<'_> {
    /// Convert `expr` to `target`, reporting a mismatch if it is not assignable
    pub(super) fn coerce(&mut self, expr: &mut Expr, target: TypeId) -> bool {
        let source = expr.ty;
        if self.ctx.is_invalid(source) || self.ctx.is_invalid(target) {
            return false;
        }
        if self.ctx.unalias(source) == self.ctx.unalias(target) {
            return true;
        }
        if !self.ctx.is_assignable_from(target, source) {
            self.error(CheckError::TypeMismatch {
                expected: self.display(target),
                actual: self.display(source),
                span: expr.span,
            });
            return false;
        }
        self.convert(expr, target);
        true
    }

    /// Wrap an assignable `expr` in the conversion to `target`
    fn convert(&mut self, expr: &mut Expr, target: TypeId) {
        let to = self.ctx.unalias(target);
        let from = self.ctx.unalias(expr.ty);
        if to == from {
            return;
        }

        if let Some(members) = self.ctx.union(to).map(|u| u.members.clone()) {
            // Exact member first, then the first member that accepts the value
            let tag = match members.iter().position(|m| *m == from) {
                Some(tag) => tag,
                None => match members.iter().position(|m| self.ctx.is_assignable_from(*m, from)) {
                    Some(tag) => tag,
                    None => return,
                },
            };
            self.convert(expr, members[tag]);
            wrap(expr, CoercionKind::UnionWrap { tag: tag as u32 }, target);
            return;
        }

        let kind = if self.ctx.interface(to).is_some() {
            match self.ctx.implementation(from, to) {
                Some(implementation) => CoercionKind::ToInterface(implementation),
                None => return,
            }
        } else if self.ctx.float(to).is_some() && self.ctx.int(from).is_some() {
            CoercionKind::IntToFloat
        } else {
            CoercionKind::Identity
        };
        wrap(expr, kind, target);
    }
}

/// Replace `expr` with a conversion node of type `ty` around it
pub(super) fn wrap(expr: &mut Expr, kind: CoercionKind, ty: TypeId) {
    let span = expr.span;
    let source = std::mem::replace(expr, Expr::new(ExprKind::Null));
    *expr = Expr::new(ExprKind::Coerce(Coercion {
        source: Box::new(source),
        kind,
    }))
    .with_span(span);
    expr.ty = ty;
}
