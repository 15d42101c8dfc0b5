//! Calls and overload resolution
//!
//! Resolution first filters candidates by arity. With a single survivor
//! the arguments are checked against its parameter types so literals pick
//! them up; otherwise arguments are checked on their own. An exact match
//! wins outright, else exactly one candidate must accept every argument.

use super::checker::TypeChecker;
use super::error::CheckError;
use crate::ast::*;
use crate::diagnostic::Span;
use crate::types::TypeId;

/// A callable considered during overload resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Candidate {
    pub target: DeclRef,
    /// Function type, excluding any receiver
    pub signature: TypeId,
}

impl TypeChecker<'_> {
    pub(super) fn check_call(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Call { callee, args } = &mut expr.kind else {
            return TypeId::INVALID;
        };

        match callee.kind {
            ExprKind::TypeValue(_) => self.check_construct(callee, args, span),
            ExprKind::Member { .. } => self.check_method_call(callee, args, span),
            ExprKind::Ident if callee.referenced.is_none() || matches!(callee.referenced, Some(DeclRef::Function(_))) => {
                self.check_function_call(callee, args, span)
            }
            ExprKind::Ident if matches!(callee.referenced, Some(DeclRef::Foreign(_))) => {
                self.check_foreign_call(callee, args, span)
            }
            _ => self.check_indirect_call(callee, args, span),
        }
    }

    /// `T(args)`: pick a constructor, or the implicit one taking no arguments
    fn check_construct(&mut self, callee: &mut Expr, args: &mut [Expr], span: Span) -> TypeId {
        let ExprKind::TypeValue(ty) = &callee.kind else {
            return TypeId::INVALID;
        };
        let ty = ty.clone();
        let class = self.resolve_type(&ty, span);
        callee.ty = TypeId::TYPE_OF_TYPES;
        if self.ctx.is_invalid(class) {
            self.check_args(&[], args);
            return TypeId::INVALID;
        }

        let constructors = match self.ctx.class(class) {
            Some(c) if c.decl.is_some() => c.constructors.clone(),
            _ => {
                self.check_args(&[], args);
                self.error(CheckError::NotCallable {
                    ty: self.display(class),
                    span,
                });
                return TypeId::INVALID;
            }
        };

        if constructors.is_empty() {
            if !args.is_empty() {
                self.check_args(&[], args);
                self.error(CheckError::NoMatchingOverload {
                    name: self.display(class),
                    args: self.render_args(args),
                    span,
                });
            }
            return class;
        }

        let candidates: Vec<Candidate> = constructors
            .iter()
            .map(|m| Candidate {
                target: DeclRef::Function(m.function),
                signature: m.signature,
            })
            .collect();
        self.check_args(&candidates, args);
        let name = self.display(class);
        if let Some(chosen) = self.select_overload(&name, &candidates, args, span) {
            callee.referenced = Some(chosen.target);
        }
        class
    }

    /// `object.name(args)` on a class or an interface
    fn check_method_call(&mut self, callee: &mut Expr, args: &mut [Expr], span: Span) -> TypeId {
        let ExprKind::Member { object, name } = &mut callee.kind else {
            return TypeId::INVALID;
        };
        let object_ty = self.check_expr(object, None);
        if self.ctx.is_invalid(object_ty) {
            self.check_args(&[], args);
            return TypeId::INVALID;
        }

        let candidates = self.method_candidates(object_ty, name);
        if !candidates.is_empty() {
            let name = name.clone();
            self.check_args(&candidates, args);
            return match self.select_overload(&name, &candidates, args, span) {
                Some(chosen) => {
                    callee.referenced = Some(chosen.target);
                    callee.ty = chosen.signature;
                    self.return_type(chosen.signature)
                }
                None => TypeId::INVALID,
            };
        }

        // A field holding a function value
        let field = self
            .ctx
            .class(object_ty)
            .and_then(|c| {
                c.field_index(name)
                    .map(|i| (DeclRef::Field(i as u32), c.fields[i].ty))
            })
            .or_else(|| {
                self.ctx.interface(object_ty).and_then(|iface| {
                    iface
                        .field_slot(name)
                        .map(|s| (DeclRef::InterfaceField(s as u32), iface.fields[s].ty))
                })
            });
        match field {
            Some((decl, ty)) => {
                callee.referenced = Some(decl);
                callee.ty = ty;
                self.check_value_call(ty, args, span)
            }
            None => {
                let name = name.clone();
                self.check_args(&[], args);
                self.error(CheckError::UnknownMember {
                    ty: self.display(object_ty),
                    name,
                    span: callee.span,
                });
                TypeId::INVALID
            }
        }
    }

    /// Call through a name bound to one or more functions
    fn check_function_call(&mut self, callee: &mut Expr, args: &mut [Expr], span: Span) -> TypeId {
        let mut refs = callee.candidates.clone();
        if refs.is_empty() {
            refs.extend(callee.referenced);
        }
        if refs.is_empty() {
            self.check_args(&[], args);
            self.error(CheckError::UnresolvedReference { span: callee.span });
            return TypeId::INVALID;
        }

        if let Some(context) = callee.implicit_context.as_deref_mut() {
            self.check_expr(context, None);
        }

        let candidates: Vec<Candidate> = refs
            .iter()
            .filter_map(|r| match r {
                DeclRef::Function(f) => Some(Candidate {
                    target: *r,
                    signature: self.decls.signature(*f),
                }),
                _ => None,
            })
            .collect();
        let name = self.candidate_name(&refs);
        self.check_args(&candidates, args);
        let Some(chosen) = self.select_overload(&name, &candidates, args, span) else {
            return TypeId::INVALID;
        };

        if let DeclRef::Function(f) = chosen.target {
            match self.functions[f.index()].kind {
                FunctionKind::Method(_) if callee.implicit_context.is_none() => {
                    self.error(CheckError::ThisOutsideClass { span: callee.span });
                    return TypeId::INVALID;
                }
                FunctionKind::Constructor(_) => {
                    self.error(CheckError::FunctionValue { name, span: callee.span });
                    return TypeId::INVALID;
                }
                _ => {}
            }
        }
        callee.referenced = Some(chosen.target);
        callee.ty = chosen.signature;
        self.return_type(chosen.signature)
    }

    fn check_foreign_call(&mut self, callee: &mut Expr, args: &mut [Expr], span: Span) -> TypeId {
        let Some(DeclRef::Foreign(id)) = callee.referenced else {
            return TypeId::INVALID;
        };
        let candidate = Candidate {
            target: DeclRef::Foreign(id),
            signature: self.decls.foreign[id.index()],
        };
        let name = self.foreign_names[id.index()].clone();
        self.check_args(&[candidate], args);
        match self.select_overload(&name, &[candidate], args, span) {
            Some(chosen) => {
                callee.ty = chosen.signature;
                self.return_type(chosen.signature)
            }
            None => TypeId::INVALID,
        }
    }

    /// Call a function-typed value
    fn check_indirect_call(&mut self, callee: &mut Expr, args: &mut [Expr], span: Span) -> TypeId {
        let callee_ty = self.check_expr(callee, None);
        if self.ctx.is_invalid(callee_ty) {
            self.check_args(&[], args);
            return TypeId::INVALID;
        }
        self.check_value_call(callee_ty, args, span)
    }

    fn check_value_call(&mut self, callee_ty: TypeId, args: &mut [Expr], span: Span) -> TypeId {
        if self.ctx.function(callee_ty).is_none() {
            self.check_args(&[], args);
            self.error(CheckError::NotCallable {
                ty: self.display(callee_ty),
                span,
            });
            return TypeId::INVALID;
        }
        // Values are never overloaded; the target is only a placeholder
        let candidate = Candidate {
            target: DeclRef::Field(0),
            signature: callee_ty,
        };
        let name = self.display(callee_ty);
        self.check_args(&[candidate], args);
        match self.select_overload(&name, &[candidate], args, span) {
            Some(_) => self.return_type(callee_ty),
            None => TypeId::INVALID,
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Methods named `name` on a class, or the interface method of that name
    pub(super) fn method_candidates(&self, object_ty: TypeId, name: &str) -> Vec<Candidate> {
        if let Some(class) = self.ctx.class(object_ty) {
            return class
                .methods_named(name)
                .map(|m| Candidate {
                    target: DeclRef::Function(m.function),
                    signature: m.signature,
                })
                .collect();
        }
        if let Some(iface) = self.ctx.interface(object_ty) {
            if let Some(slot) = iface.method_slot(name) {
                return vec![Candidate {
                    target: DeclRef::InterfaceMethod(slot as u32),
                    signature: iface.methods[slot].signature,
                }];
            }
        }
        Vec::new()
    }

    /// Check arguments, using parameter types as hints when arity leaves one candidate
    pub(super) fn check_args(&mut self, candidates: &[Candidate], args: &mut [Expr]) {
        let viable: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| self.params(c.signature).len() == args.len())
            .collect();
        let hints = match viable.as_slice() {
            [only] => self.params(only.signature),
            _ => Vec::new(),
        };
        for (i, arg) in args.iter_mut().enumerate() {
            self.check_expr(arg, hints.get(i).copied());
        }
    }

    /// Pick the overload for already-checked arguments and coerce them to it
    pub(super) fn select_overload(
        &mut self,
        name: &str,
        candidates: &[Candidate],
        args: &mut [Expr],
        span: Span,
    ) -> Option<Candidate> {
        let arg_types: Vec<TypeId> = args.iter().map(|a| a.ty).collect();
        if arg_types.iter().any(|t| self.ctx.is_invalid(*t)) {
            return None;
        }

        let viable: Vec<Candidate> = candidates
            .iter()
            .copied()
            .filter(|c| self.params(c.signature).len() == args.len())
            .collect();

        let exact = viable.iter().copied().find(|c| {
            self.params(c.signature)
                .iter()
                .zip(&arg_types)
                .all(|(p, a)| self.ctx.unalias(*p) == self.ctx.unalias(*a))
        });

        let chosen = match exact {
            Some(exact) => exact,
            None => {
                let callable: Vec<Candidate> = viable
                    .into_iter()
                    .filter(|c| {
                        let params = self.params(c.signature);
                        params
                            .iter()
                            .zip(&arg_types)
                            .all(|(p, a)| self.ctx.is_assignable_from(*p, *a))
                    })
                    .collect();
                match callable.as_slice() {
                    [one] => *one,
                    [] => {
                        self.error(CheckError::NoMatchingOverload {
                            name: name.to_string(),
                            args: self.render_args(args),
                            span,
                        });
                        return None;
                    }
                    many => {
                        let candidates = many
                            .iter()
                            .map(|c| self.ctx.display_signature(name, c.signature))
                            .collect();
                        self.error(CheckError::AmbiguousOverload {
                            name: name.to_string(),
                            args: self.render_args(args),
                            candidates,
                            span,
                        });
                        return None;
                    }
                }
            }
        };

        for (arg, param) in args.iter_mut().zip(self.params(chosen.signature)) {
            self.coerce(arg, param);
        }
        Some(chosen)
    }

    fn params(&self, signature: TypeId) -> Vec<TypeId> {
        self.ctx
            .function(signature)
            .map(|f| f.params.clone())
            .unwrap_or_default()
    }

    pub(super) fn return_type(&self, signature: TypeId) -> TypeId {
        self.ctx
            .function(signature)
            .map(|f| f.return_type)
            .unwrap_or(TypeId::INVALID)
    }

    fn render_args(&self, args: &[Expr]) -> String {
        args.iter()
            .map(|a| self.display(a.ty))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(super) fn candidate_name(&self, refs: &[DeclRef]) -> String {
        refs.iter()
            .find_map(|r| match r {
                DeclRef::Function(f) => Some(self.functions[f.index()].name.clone()),
                DeclRef::Foreign(id) => Some(self.foreign_names[id.index()].clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub(super) fn render_candidates(&self, refs: &[DeclRef]) -> Vec<String> {
        refs.iter()
            .filter_map(|r| match r {
                DeclRef::Function(f) => Some(
                    self.ctx
                        .display_signature(&self.functions[f.index()].name, self.decls.signature(*f)),
                ),
                _ => None,
            })
            .collect()
    }
}
