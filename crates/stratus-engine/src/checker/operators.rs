//! Unary and binary operators

use super::checker::TypeChecker;
use super::coerce::wrap;
use super::error::CheckError;
use crate::ast::*;
use crate::diagnostic::Span;
use crate::types::TypeId;

impl TypeChecker<'_> {
    pub(super) fn check_unary(&mut self, expr: &mut Expr, expected: Option<TypeId>) -> TypeId {
        let span = expr.span;
        let ExprKind::Unary { op, operand } = &mut expr.kind else {
            return TypeId::INVALID;
        };
        let op = *op;
        let hint = match op {
            UnaryOp::Not => Some(TypeId::BOOL),
            _ => expected.filter(|t| self.ctx.is_scalar(*t)),
        };
        let ty = self.check_expr(operand, hint);
        if self.ctx.is_invalid(ty) {
            return TypeId::INVALID;
        }

        let ok = match op {
            UnaryOp::Neg => self.ctx.is_scalar(ty),
            UnaryOp::Not => self.ctx.unalias(ty) == TypeId::BOOL,
            UnaryOp::BitNot => self.ctx.int(ty).is_some(),
        };
        if ok {
            self.ctx.unalias(ty)
        } else {
            self.error(CheckError::InvalidUnaryOperand {
                op: op.token().to_string(),
                operand: self.display(ty),
                span,
            });
            TypeId::INVALID
        }
    }

    pub(super) fn check_binary(&mut self, expr: &mut Expr, expected: Option<TypeId>) -> TypeId {
        let span = expr.span;
        let ExprKind::Binary { op, left, right } = &mut expr.kind else {
            return TypeId::INVALID;
        };
        let op = *op;
        let family = op.family();
        let hint = match family {
            OperatorFamily::Arithmetic | OperatorFamily::Bitwise => expected.filter(|t| self.ctx.is_scalar(*t)),
            OperatorFamily::Logical => Some(TypeId::BOOL),
            _ => None,
        };

        // A literal on the left takes its type from the other side: `1 + x`
        let (lt, rt) = if left.literal().is_some() && right.literal().is_none() {
            let rt = self.check_expr(right, hint);
            let lt = self.check_expr(left, self.operand_hint(rt, hint));
            (lt, rt)
        } else {
            let lt = self.check_expr(left, hint);
            let rt = self.check_expr(right, self.operand_hint(lt, hint));
            (lt, rt)
        };
        if self.ctx.is_invalid(lt) || self.ctx.is_invalid(rt) {
            return TypeId::INVALID;
        }

        // User-defined operator: a method named after the token on the left operand's class
        if self.ctx.class(lt).is_some() && !self.ctx.is_string(lt) {
            let candidates = self.method_candidates(lt, op.token());
            if !candidates.is_empty() {
                let args = std::slice::from_mut(right.as_mut());
                return match self.select_overload(op.token(), &candidates, args, span) {
                    Some(chosen) => {
                        expr.referenced = Some(chosen.target);
                        self.return_type(chosen.signature)
                    }
                    None => TypeId::INVALID,
                };
            }
        }

        let result = match family {
            OperatorFamily::Logical => {
                let both_bool = self.ctx.unalias(lt) == TypeId::BOOL && self.ctx.unalias(rt) == TypeId::BOOL;
                both_bool.then_some(TypeId::BOOL)
            }
            OperatorFamily::Arithmetic if self.ctx.is_string(lt) && op == BinaryOp::Add => {
                if self.ctx.is_string(rt) {
                    Some(TypeId::STRING)
                } else if self.ctx.int(rt).is_some() {
                    wrap(right, CoercionKind::IntToString, TypeId::STRING);
                    Some(TypeId::STRING)
                } else {
                    None
                }
            }
            OperatorFamily::Arithmetic => self.join_scalars(left, right, |ctx, t| ctx.is_scalar(t)),
            OperatorFamily::Comparison => self
                .join_scalars(left, right, |ctx, t| ctx.is_scalar(t))
                .map(|_| TypeId::BOOL),
            OperatorFamily::Equality => {
                if self.ctx.unalias(lt) == self.ctx.unalias(rt) {
                    Some(TypeId::BOOL)
                } else {
                    self.join_scalars(left, right, |ctx, t| ctx.is_scalar(t))
                        .map(|_| TypeId::BOOL)
                }
            }
            OperatorFamily::Bitwise => self.join_scalars(left, right, |ctx, t| ctx.int(t).is_some()),
        };

        match result {
            Some(ty) => ty,
            None => {
                self.invalid_operands(op, lt, rt, span);
                TypeId::INVALID
            }
        }
    }

    /// Hint for the second operand: the first operand's type when it is a number
    fn operand_hint(&self, other: TypeId, hint: Option<TypeId>) -> Option<TypeId> {
        if self.ctx.is_scalar(other) || self.ctx.unalias(other) == TypeId::BOOL {
            Some(other)
        } else {
            hint
        }
    }

    /// Bring two operands of an accepted kind to a common type
    ///
    /// The right operand is converted to the left's type when possible,
    /// otherwise the left to the right's.
    fn join_scalars(
        &mut self,
        left: &mut Expr,
        right: &mut Expr,
        accepts: impl Fn(&crate::types::TypeContext, TypeId) -> bool,
    ) -> Option<TypeId> {
        let (lt, rt) = (left.ty, right.ty);
        if !accepts(&*self.ctx, lt) || !accepts(&*self.ctx, rt) {
            return None;
        }
        if self.ctx.is_assignable_from(lt, rt) {
            self.coerce(right, lt);
            Some(self.ctx.unalias(lt))
        } else if self.ctx.is_assignable_from(rt, lt) {
            self.coerce(left, rt);
            Some(self.ctx.unalias(rt))
        } else {
            None
        }
    }

    fn invalid_operands(&mut self, op: BinaryOp, left: TypeId, right: TypeId, span: Span) {
        self.error(CheckError::InvalidOperands {
            op: op.token().to_string(),
            left: self.display(left),
            right: self.display(right),
            span,
        });
    }
}
