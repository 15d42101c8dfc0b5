//! Flow-sensitive refinement of union-typed locals
//!
//! An `if (v is T)` pushes a refinement scope binding `v` to `T` for the
//! true branch. Lookups walk scopes innermost first and fall back to the
//! declared type.

use crate::ast::{Block, Expr, ExprKind, LocalId, Stmt, DeclRef};
use crate::types::{TypeContext, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Stack of refinement overlays
#[derive(Debug, Default)]
pub struct Refinements {
    scopes: Vec<FxHashMap<LocalId, TypeId>>,
}

impl Refinements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Record a narrowed type for `local` in the innermost scope
    pub fn refine(&mut self, local: LocalId, ty: TypeId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(local, ty);
        }
    }

    /// Narrowed type of `local`, if any scope refines it
    pub fn get(&self, local: LocalId) -> Option<TypeId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&local).copied())
    }

    /// Forget every refinement of `local`
    pub fn invalidate(&mut self, local: LocalId) {
        for scope in &mut self.scopes {
            scope.remove(&local);
        }
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

/// Type of the false branch of `v is member` for a union-typed `v`
///
/// Only two-member unions get a complement; larger unions would need a
/// partial union, which is never recorded.
pub fn complement(ctx: &TypeContext, union: TypeId, member: TypeId) -> Option<TypeId> {
    let members = &ctx.union(union)?.members;
    if members.len() != 2 {
        return None;
    }
    members.iter().copied().find(|m| *m != member)
}

/// Locals assigned anywhere inside `block`
pub fn assigned_locals(block: &Block) -> FxHashSet<LocalId> {
    let mut found = FxHashSet::default();
    for stmt in &block.stmts {
        collect_stmt(stmt, &mut found);
    }
    found
}

fn collect_stmt(stmt: &Stmt, found: &mut FxHashSet<LocalId>) {
    match stmt {
        Stmt::Let(s) => {
            if let Some(init) = &s.init {
                collect_expr(init, found);
            }
        }
        Stmt::Expr(e) => collect_expr(e, found),
        Stmt::Return(s) => {
            if let Some(value) = &s.value {
                collect_expr(value, found);
            }
        }
        Stmt::If(s) => {
            collect_expr(&s.condition, found);
            found.extend(assigned_locals(&s.then_branch));
            if let Some(else_branch) = &s.else_branch {
                found.extend(assigned_locals(else_branch));
            }
        }
        Stmt::While(s) => {
            collect_expr(&s.condition, found);
            found.extend(assigned_locals(&s.body));
        }
        Stmt::Block(b) => found.extend(assigned_locals(b)),
    }
}

fn collect_expr(expr: &Expr, found: &mut FxHashSet<LocalId>) {
    match &expr.kind {
        ExprKind::Assign { target, value, .. } => {
            if let Some(DeclRef::Local(local)) = target.referenced {
                found.insert(local);
            }
            collect_expr(target, found);
            collect_expr(value, found);
        }
        ExprKind::Member { object, .. } => collect_expr(object, found),
        ExprKind::Index { object, index } => {
            collect_expr(object, found);
            collect_expr(index, found);
        }
        ExprKind::Call { callee, args } => {
            collect_expr(callee, found);
            args.iter().for_each(|a| collect_expr(a, found));
        }
        ExprKind::Unary { operand, .. } => collect_expr(operand, found),
        ExprKind::Binary { left, right, .. } => {
            collect_expr(left, found);
            collect_expr(right, found);
        }
        ExprKind::Is { operand, .. } | ExprKind::Cast { operand, .. } => collect_expr(operand, found),
        ExprKind::Coerce(c) => collect_expr(&c.source, found),
        ExprKind::Array(elements) => elements.iter().for_each(|e| collect_expr(e, found)),
        _ => {}
    }
}
