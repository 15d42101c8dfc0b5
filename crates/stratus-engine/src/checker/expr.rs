//! Expression checking

use super::checker::TypeChecker;
use super::coerce::wrap;
use super::error::CheckError;
use crate::ast::*;
use crate::types::{IntType, TypeId};

impl TypeChecker<'_> {
    /// Check an expression, annotating it with its type
    ///
    /// `expected` is a hint used to type literals; it never reports errors
    /// on its own. Callers coerce the result to the slot type.
    pub(super) fn check_expr(&mut self, expr: &mut Expr, expected: Option<TypeId>) -> TypeId {
        match expr.kind {
            ExprKind::Cast { .. } => return self.check_cast(expr),
            ExprKind::Ident => {
                if let Some(DeclRef::Local(local)) = expr.referenced {
                    return self.check_local(expr, local);
                }
            }
            _ => {}
        }
        let ty = self.infer_expr(expr, expected);
        expr.ty = ty;
        ty
    }

    fn infer_expr(&mut self, expr: &mut Expr, expected: Option<TypeId>) -> TypeId {
        let span = expr.span;
        match expr.kind {
            ExprKind::Int(value) => self.int_literal_type(value, expected),
            ExprKind::Float(_) => self.float_literal_type(expected),
            ExprKind::Str(_) => TypeId::STRING,
            ExprKind::Bool(_) => TypeId::BOOL,
            ExprKind::Null => TypeId::NULL,
            ExprKind::Ident => self.check_ident(expr),
            ExprKind::This => match self.state().and_then(|s| s.this_type) {
                Some(ty) => ty,
                None => {
                    self.error(CheckError::ThisOutsideClass { span });
                    TypeId::INVALID
                }
            },
            ExprKind::TypeValue(ref ty) => {
                let ty = ty.clone();
                self.resolve_type(&ty, span);
                TypeId::TYPE_OF_TYPES
            }
            ExprKind::Member { .. } => self.check_member(expr),
            ExprKind::Index { .. } => self.check_index(expr),
            ExprKind::Call { .. } => self.check_call(expr),
            ExprKind::Unary { .. } => self.check_unary(expr, expected),
            ExprKind::Binary { .. } => self.check_binary(expr, expected),
            ExprKind::Assign { .. } => self.check_assign(expr),
            ExprKind::Is { .. } => self.check_is(expr),
            ExprKind::Array(_) => self.check_array(expr, expected),
            // Already typed by whoever created the node
            ExprKind::Coerce(_) | ExprKind::CompoundOperand | ExprKind::Cast { .. } => expr.ty,
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// An int literal adopts the expected int type when it fits
    fn int_literal_type(&self, value: i64, expected: Option<TypeId>) -> TypeId {
        let fits = |ty: TypeId| self.ctx.int(ty).is_some_and(|i| int_fits(value, i));
        let Some(expected) = expected else {
            return TypeId::I64;
        };
        if fits(expected) {
            return self.ctx.unalias(expected);
        }
        self.ctx
            .union(expected)
            .and_then(|u| u.members.iter().copied().find(|m| fits(*m)))
            .unwrap_or(TypeId::I64)
    }

    fn float_literal_type(&self, expected: Option<TypeId>) -> TypeId {
        let Some(expected) = expected else {
            return TypeId::F64;
        };
        if self.ctx.float(expected).is_some() {
            return self.ctx.unalias(expected);
        }
        self.ctx
            .union(expected)
            .and_then(|u| u.members.iter().copied().find(|m| self.ctx.float(*m).is_some()))
            .unwrap_or(TypeId::F64)
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// Read a local, unwrapping a union whose member is known from flow
    fn check_local(&mut self, expr: &mut Expr, local: LocalId) -> TypeId {
        if !self.is_bound(local) {
            self.error(CheckError::UnresolvedReference { span: expr.span });
            expr.ty = TypeId::INVALID;
            return TypeId::INVALID;
        }
        let declared = self.local_type(local);
        expr.ty = declared;

        let Some(refined) = self.refinements.get(local) else {
            return declared;
        };
        match self.ctx.union_tag(declared, refined) {
            Some(tag) if refined != declared => {
                wrap(expr, CoercionKind::UnionNarrow { tag }, refined);
                refined
            }
            _ => declared,
        }
    }

    fn check_ident(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        if expr.referenced.is_none() && expr.candidates.len() == 1 {
            expr.referenced = expr.candidates.first().copied();
        }
        match expr.referenced {
            Some(DeclRef::Function(f)) => {
                let info = &self.functions[f.index()];
                if info.kind == FunctionKind::Free {
                    self.decls.signature(f)
                } else {
                    let name = info.name.clone();
                    self.error(CheckError::FunctionValue { name, span });
                    TypeId::INVALID
                }
            }
            Some(DeclRef::Foreign(id)) => {
                let name = self.foreign_names[id.index()].clone();
                self.error(CheckError::FunctionValue { name, span });
                TypeId::INVALID
            }
            Some(DeclRef::EnumElement { enumeration, .. }) => self.decls.enums[enumeration.index()],
            Some(DeclRef::Local(local)) => self.check_local(expr, local),
            Some(_) => {
                self.error(CheckError::UnresolvedReference { span });
                TypeId::INVALID
            }
            None if expr.candidates.len() > 1 => {
                let candidates = self.render_candidates(&expr.candidates);
                let name = self.candidate_name(&expr.candidates);
                self.error(CheckError::AmbiguousOverload {
                    name,
                    args: "_".to_string(),
                    candidates,
                    span,
                });
                TypeId::INVALID
            }
            None => {
                self.error(CheckError::UnresolvedReference { span });
                TypeId::INVALID
            }
        }
    }

    // ========================================================================
    // Members and indexing
    // ========================================================================

    fn check_member(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Member { object, name } = &mut expr.kind else {
            return TypeId::INVALID;
        };
        let object_ty = self.check_expr(object, None);
        if self.ctx.is_invalid(object_ty) {
            return TypeId::INVALID;
        }

        if let Some(class) = self.ctx.class(object_ty) {
            if let Some(index) = class.field_index(name) {
                let ty = class.fields[index].ty;
                expr.referenced = Some(DeclRef::Field(index as u32));
                return ty;
            }
            if class.methods_named(name).next().is_some() {
                let name = name.clone();
                self.error(CheckError::FunctionValue { name, span });
                return TypeId::INVALID;
            }
        }

        if let Some(iface) = self.ctx.interface(object_ty) {
            if let Some(slot) = iface.field_slot(name) {
                let ty = iface.fields[slot].ty;
                expr.referenced = Some(DeclRef::InterfaceField(slot as u32));
                return ty;
            }
            if iface.method_slot(name).is_some() {
                let name = name.clone();
                self.error(CheckError::FunctionValue { name, span });
                return TypeId::INVALID;
            }
        }

        let has_length = self.ctx.array_element(object_ty).is_some() || self.ctx.is_string(object_ty);
        if has_length && name == "length" {
            return TypeId::I64;
        }

        let name = name.clone();
        self.error(CheckError::UnknownMember {
            ty: self.display(object_ty),
            name,
            span,
        });
        TypeId::INVALID
    }

    fn check_index(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Index { object, index } = &mut expr.kind else {
            return TypeId::INVALID;
        };
        let object_ty = self.check_expr(object, None);
        if self.ctx.is_invalid(object_ty) {
            self.check_expr(index, None);
            return TypeId::INVALID;
        }

        let element = if self.ctx.is_string(object_ty) {
            Some(TypeId::U8)
        } else {
            self.ctx.array_element(object_ty)
        };
        if let Some(element) = element {
            let index_ty = self.check_expr(index, Some(TypeId::I64));
            if self.ctx.int(index_ty).is_none() && !self.ctx.is_invalid(index_ty) {
                self.error(CheckError::TypeMismatch {
                    expected: "integer".to_string(),
                    actual: self.display(index_ty),
                    span: index.span,
                });
            }
            return element;
        }

        // Subscript operator method `[]`
        let candidates = self.method_candidates(object_ty, "[]");
        if candidates.is_empty() {
            self.check_expr(index, None);
            self.error(CheckError::NotIndexable {
                ty: self.display(object_ty),
                span,
            });
            return TypeId::INVALID;
        }
        let args = std::slice::from_mut(index.as_mut());
        self.check_args(&candidates, args);
        match self.select_overload("[]", &candidates, args, span) {
            Some(chosen) => {
                expr.referenced = Some(chosen.target);
                self.return_type(chosen.signature)
            }
            None => TypeId::INVALID,
        }
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn check_assign(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Assign { op, target, value } = &mut expr.kind else {
            return TypeId::INVALID;
        };
        let target_ty = self.check_assign_target(target);

        match op {
            Some(op) => {
                // `t op= v` is checked as `t = t op v` with `t` evaluated once
                let rhs = std::mem::replace(value.as_mut(), Expr::new(ExprKind::Null));
                let mut operand = Expr::new(ExprKind::CompoundOperand).with_span(target.span);
                operand.ty = target_ty;
                let mut combined = Expr::new(ExprKind::Binary {
                    op: *op,
                    left: Box::new(operand),
                    right: Box::new(rhs),
                })
                .with_span(span);
                self.check_expr(&mut combined, Some(target_ty));
                self.coerce(&mut combined, target_ty);
                **value = combined;
            }
            None => {
                self.check_expr(value, Some(target_ty));
                self.coerce(value, target_ty);
            }
        }
        target_ty
    }

    /// Type a storage location; refinements of an assigned local are dropped
    fn check_assign_target(&mut self, target: &mut Expr) -> TypeId {
        let span = target.span;
        match target.kind {
            ExprKind::Ident => match target.referenced {
                Some(DeclRef::Local(local)) => {
                    if !self.is_bound(local) {
                        self.error(CheckError::UnresolvedReference { span });
                        return TypeId::INVALID;
                    }
                    self.refinements.invalidate(local);
                    target.ty = self.local_type(local);
                    target.ty
                }
                _ => {
                    self.error(CheckError::InvalidAssignmentTarget { span });
                    TypeId::INVALID
                }
            },
            ExprKind::Member { .. } => {
                let ty = self.check_expr(target, None);
                match target.referenced {
                    Some(DeclRef::Field(_)) => ty,
                    Some(DeclRef::InterfaceField(_)) => {
                        let (name, interface) = match &target.kind {
                            ExprKind::Member { object, name } => (name.clone(), self.display(object.ty)),
                            _ => (String::new(), String::new()),
                        };
                        self.error(CheckError::ReadOnlyField { name, interface, span });
                        TypeId::INVALID
                    }
                    _ if self.ctx.is_invalid(ty) => TypeId::INVALID,
                    _ => {
                        self.error(CheckError::InvalidAssignmentTarget { span });
                        TypeId::INVALID
                    }
                }
            }
            ExprKind::Index { .. } => {
                let ty = self.check_expr(target, None);
                let is_array = match &target.kind {
                    ExprKind::Index { object, .. } => self.ctx.array_element(object.ty).is_some(),
                    _ => false,
                };
                if is_array || self.ctx.is_invalid(ty) {
                    ty
                } else {
                    self.error(CheckError::InvalidAssignmentTarget { span });
                    TypeId::INVALID
                }
            }
            _ => {
                self.check_expr(target, None);
                self.error(CheckError::InvalidAssignmentTarget { span });
                TypeId::INVALID
            }
        }
    }

    // ========================================================================
    // Type tests and casts
    // ========================================================================

    fn check_is(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Is { operand, target, check } = &mut expr.kind else {
            return TypeId::INVALID;
        };
        let operand_ty = self.check_expr(operand, None);
        let target_ty = self.resolve_type(target, span);
        if self.ctx.is_invalid(operand_ty) || self.ctx.is_invalid(target_ty) {
            return TypeId::BOOL;
        }

        let from = self.ctx.unalias(operand_ty);
        let to = self.ctx.unalias(target_ty);
        if from == to {
            *check = IsCheck::Always;
        } else if let Some(tag) = self.ctx.union_tag(from, to) {
            *check = IsCheck::UnionTag(tag);
        } else if self.ctx.interface(to).is_some() && self.ctx.class(from).is_some() {
            match self.ctx.get_or_create_implementation(from, to) {
                Ok(_) => *check = IsCheck::Always,
                Err(missing) => self.error(CheckError::MissingInterfaceMembers {
                    class: self.display(from),
                    interface: self.display(to),
                    missing: missing.into_iter().map(|m| m.signature).collect(),
                    span,
                }),
            }
        } else {
            self.error(CheckError::InvalidIsTarget {
                operand: self.display(operand_ty),
                target: self.display(target_ty),
                span,
            });
        }
        TypeId::BOOL
    }

    /// An explicit cast is an implicit conversion made visible
    fn check_cast(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Cast { operand, target } = std::mem::replace(&mut expr.kind, ExprKind::Null) else {
            return TypeId::INVALID;
        };
        let mut operand = *operand;
        let target_ty = self.resolve_type(&target, span);
        let source_ty = self.check_expr(&mut operand, Some(target_ty));

        if self.ctx.is_invalid(source_ty) || self.ctx.is_invalid(target_ty) {
            *expr = operand;
            expr.ty = TypeId::INVALID;
            return TypeId::INVALID;
        }
        if !self.ctx.is_assignable_from(target_ty, source_ty) {
            self.error(CheckError::InvalidCast {
                from: self.display(source_ty),
                to: self.display(target_ty),
                span,
            });
            *expr = operand;
            expr.ty = TypeId::INVALID;
            return TypeId::INVALID;
        }

        self.coerce(&mut operand, target_ty);
        *expr = operand;
        expr.ty
    }

    // ========================================================================
    // Arrays
    // ========================================================================

    fn check_array(&mut self, expr: &mut Expr, expected: Option<TypeId>) -> TypeId {
        let span = expr.span;
        let ExprKind::Array(elements) = &mut expr.kind else {
            return TypeId::INVALID;
        };

        let expected_element = expected.and_then(|e| {
            self.ctx.array_element(e).or_else(|| {
                self.ctx
                    .union(e)
                    .and_then(|u| u.members.iter().find_map(|m| self.ctx.array_element(*m)))
            })
        });

        let element = match expected_element {
            Some(element) => element,
            None => match elements.first_mut() {
                Some(first) => {
                    let ty = self.check_expr(first, None);
                    if self.ctx.unalias(ty) == TypeId::VOID {
                        self.error(CheckError::VoidValue { span: first.span });
                        return TypeId::INVALID;
                    }
                    ty
                }
                None => {
                    self.error(CheckError::CannotInferArrayType { span });
                    return TypeId::INVALID;
                }
            },
        };
        if self.ctx.is_invalid(element) {
            return TypeId::INVALID;
        }

        let skip = usize::from(expected_element.is_none());
        for item in elements.iter_mut().skip(skip) {
            self.check_expr(item, Some(element));
        }
        for item in elements.iter_mut() {
            self.coerce(item, element);
        }
        self.ctx.array_type(element)
    }
}

fn int_fits(value: i64, ty: IntType) -> bool {
    match (ty.signed, ty.width) {
        (true, 8) => i8::try_from(value).is_ok(),
        (true, 16) => i16::try_from(value).is_ok(),
        (true, 32) => i32::try_from(value).is_ok(),
        (true, _) => true,
        (false, 8) => u8::try_from(value).is_ok(),
        (false, 16) => u16::try_from(value).is_ok(),
        (false, 32) => u32::try_from(value).is_ok(),
        (false, _) => value >= 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_fits() {
        let i8t = IntType { signed: true, width: 8 };
        let u16t = IntType { signed: false, width: 16 };
        assert!(int_fits(-128, i8t));
        assert!(!int_fits(128, i8t));
        assert!(int_fits(65535, u16t));
        assert!(!int_fits(-1, u16t));
    }
}
