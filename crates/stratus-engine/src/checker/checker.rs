//! Type checker core: declarations, functions and statements
//!
//! Expressions, coercions, overloads and operators live in sibling modules
//! as further `impl TypeChecker` blocks.

use super::error::{CheckError, CheckWarning, WarningConfig};
use super::narrowing::{self, Refinements};
use crate::ast::*;
use crate::diagnostic::Span;
use crate::types::{Field, InterfaceMethod, Method, TypeContext, TypeId};

/// Types the checker assigned to each declaration
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub classes: Vec<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub enums: Vec<TypeId>,
    pub aliases: Vec<TypeId>,
    /// Signature of each function, excluding the receiver
    pub functions: Vec<TypeId>,
    pub foreign: Vec<TypeId>,
}

impl Declarations {
    pub fn class(&self, id: ClassId) -> TypeId {
        self.classes[id.index()]
    }

    pub fn signature(&self, id: FunctionId) -> TypeId {
        self.functions[id.index()]
    }
}

/// Result of a successful check
#[derive(Debug)]
pub struct CheckResult {
    pub declarations: Declarations,
    pub warnings: Vec<CheckWarning>,
}

pub(super) struct FunctionInfo {
    pub name: String,
    pub kind: FunctionKind,
}

/// State of the function being checked
pub(super) struct FunctionState {
    pub return_type: TypeId,
    pub this_type: Option<TypeId>,
    pub local_types: Vec<TypeId>,
    pub local_names: Vec<String>,
    /// Whether a parameter or `let` has introduced the local yet
    pub bound: Vec<bool>,
}

/// Type checker
///
/// Annotates a [`Module`] in place. Errors are recovered locally by typing
/// the offending node `Invalid`, so one pass reports every error.
pub struct TypeChecker<'a> {
    pub(super) ctx: &'a mut TypeContext,
    config: &'a WarningConfig,
    pub(super) errors: Vec<CheckError>,
    warnings: Vec<CheckWarning>,
    pub(super) decls: Declarations,
    pub(super) functions: Vec<FunctionInfo>,
    pub(super) foreign_names: Vec<String>,
    /// Type parameters usable by `TypeExpr::Param` in the current context
    pub(super) generic_scope: Vec<TypeId>,
    pub(super) current: Option<FunctionState>,
    pub(super) refinements: Refinements,
}

impl<'a> TypeChecker<'a> {
    pub fn new(ctx: &'a mut TypeContext, config: &'a WarningConfig) -> Self {
        Self {
            ctx,
            config,
            errors: Vec::new(),
            warnings: Vec::new(),
            decls: Declarations::default(),
            functions: Vec::new(),
            foreign_names: Vec::new(),
            generic_scope: Vec::new(),
            current: None,
            refinements: Refinements::new(),
        }
    }

    /// Check a whole module
    pub fn check(mut self, module: &mut Module) -> Result<CheckResult, Vec<CheckError>> {
        self.collect_declarations(module);
        log::debug!(
            "checking {} functions, {} classes in {}",
            module.functions.len(),
            module.classes.len(),
            module.path
        );
        for index in 0..module.functions.len() {
            self.check_function(module, FunctionId(index as u32));
        }

        if self.errors.is_empty() {
            Ok(CheckResult {
                declarations: self.decls,
                warnings: self.warnings,
            })
        } else {
            Err(self.errors)
        }
    }

    pub(super) fn error(&mut self, error: CheckError) {
        self.errors.push(error);
    }

    pub(super) fn warn(&mut self, warning: CheckWarning) {
        let code = warning.code();
        if !self.config.is_enabled(code) {
            return;
        }
        if self.config.is_denied(code) {
            self.errors.push(CheckError::DeniedWarning {
                code: code.as_str(),
                message: warning.to_string(),
                span: warning.span(),
            });
        } else {
            self.warnings.push(warning);
        }
    }

    pub(super) fn display(&self, ty: TypeId) -> String {
        self.ctx.display(ty)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn collect_declarations(&mut self, module: &Module) {
        // Nominal types first so declarations can refer to each other
        for (i, class) in module.classes.iter().enumerate() {
            let ty = self
                .ctx
                .declare_class(ClassId(i as u32), &class.name, &class.generic_params);
            self.decls.classes.push(ty);
        }
        for (i, iface) in module.interfaces.iter().enumerate() {
            let ty = self.ctx.declare_interface(InterfaceId(i as u32), &iface.name);
            self.decls.interfaces.push(ty);
        }
        for (i, e) in module.enums.iter().enumerate() {
            let ty = self.ctx.enum_type(EnumId(i as u32), &e.name, e.elements.clone());
            self.decls.enums.push(ty);
        }
        for (i, alias) in module.aliases.iter().enumerate() {
            let ty = self.ctx.declare_alias(AliasId(i as u32), &alias.name);
            self.decls.aliases.push(ty);
        }
        for (i, alias) in module.aliases.iter().enumerate() {
            let target = self.resolve_type(&alias.aliased, alias.span);
            self.ctx.define_alias(self.decls.aliases[i], target);
        }

        for function in &module.functions {
            self.enter_class_scope(function.kind.owner());
            let params = function
                .params
                .iter()
                .map(|p| self.resolve_type(&p.ty, function.span))
                .collect();
            let ret = match function.kind {
                FunctionKind::Constructor(_) => TypeId::VOID,
                _ => self.resolve_type(&function.return_type, function.span),
            };
            let signature = self.ctx.function_type(params, ret);
            self.decls.functions.push(signature);
            self.functions.push(FunctionInfo {
                name: function.name.clone(),
                kind: function.kind,
            });
        }

        for (i, class) in module.classes.iter().enumerate() {
            let id = ClassId(i as u32);
            self.enter_class_scope(Some(id));
            let fields = class
                .fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    ty: self.resolve_type(&f.ty, f.span),
                })
                .collect();
            let bind = |decls: &Declarations, ids: &[FunctionId]| -> Vec<Method> {
                ids.iter()
                    .map(|fid| Method {
                        name: module.function(*fid).name.clone(),
                        function: *fid,
                        signature: decls.signature(*fid),
                    })
                    .collect()
            };
            let methods = bind(&self.decls, &class.methods);
            let constructors = bind(&self.decls, &class.constructors);
            self.ctx
                .define_class(self.decls.class(id), fields, methods, constructors);
        }
        self.generic_scope.clear();

        for (i, iface) in module.interfaces.iter().enumerate() {
            let methods = iface
                .methods
                .iter()
                .map(|m| {
                    let params = m.params.iter().map(|p| self.resolve_type(p, m.span)).collect();
                    let ret = self.resolve_type(&m.return_type, m.span);
                    InterfaceMethod {
                        name: m.name.clone(),
                        signature: self.ctx.function_type(params, ret),
                    }
                })
                .collect();
            let fields = iface
                .fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    ty: self.resolve_type(&f.ty, f.span),
                })
                .collect();
            self.ctx
                .define_interface(self.decls.interfaces[i], methods, fields);
        }

        for foreign in &module.foreign_functions {
            let params = foreign
                .params
                .iter()
                .map(|p| self.resolve_type(p, foreign.span))
                .collect();
            let ret = self.resolve_type(&foreign.return_type, foreign.span);
            let signature = self.ctx.function_type(params, ret);
            self.decls.foreign.push(signature);
            self.foreign_names.push(foreign.name.clone());
        }
    }

    fn enter_class_scope(&mut self, class: Option<ClassId>) {
        self.generic_scope = class
            .and_then(|c| self.ctx.class(self.decls.class(c)))
            .map(|c| c.generic_params.clone())
            .unwrap_or_default();
    }

    /// Resolve type syntax to an interned type
    pub(super) fn resolve_type(&mut self, ty: &TypeExpr, span: Span) -> TypeId {
        match ty {
            TypeExpr::Void => TypeId::VOID,
            TypeExpr::Null => TypeId::NULL,
            TypeExpr::Bool => TypeId::BOOL,
            TypeExpr::Pointer => TypeId::POINTER,
            TypeExpr::String => TypeId::STRING,
            TypeExpr::Invalid => TypeId::INVALID,
            TypeExpr::Int { signed, width } => {
                if matches!(width, 8 | 16 | 32 | 64) {
                    self.ctx.int_type(*signed, *width)
                } else {
                    self.error(CheckError::TypeMismatch {
                        expected: "integer width 8, 16, 32 or 64".to_string(),
                        actual: width.to_string(),
                        span,
                    });
                    TypeId::INVALID
                }
            }
            TypeExpr::Float { width } => {
                if matches!(width, 32 | 64) {
                    self.ctx.float_type(*width)
                } else {
                    self.error(CheckError::TypeMismatch {
                        expected: "float width 32 or 64".to_string(),
                        actual: width.to_string(),
                        span,
                    });
                    TypeId::INVALID
                }
            }
            TypeExpr::Class { class, args } => {
                let Some(base) = self.decls.classes.get(class.index()).copied() else {
                    self.error(CheckError::UnresolvedReference { span });
                    return TypeId::INVALID;
                };
                let params = self
                    .ctx
                    .class(base)
                    .map(|c| c.generic_params.clone())
                    .unwrap_or_default();
                if args.is_empty() && (params.is_empty() || params == self.generic_scope) {
                    return base;
                }
                if args.len() != params.len() {
                    self.error(CheckError::InvalidTypeArguments {
                        name: self.display(base),
                        expected: params.len(),
                        actual: args.len(),
                        span,
                    });
                    return TypeId::INVALID;
                }
                let args: Vec<TypeId> = args.iter().map(|a| self.resolve_type(a, span)).collect();
                if args.contains(&TypeId::INVALID) {
                    return TypeId::INVALID;
                }
                self.ctx.reify(base, &args).unwrap_or(TypeId::INVALID)
            }
            TypeExpr::Interface(id) => {
                let found = self.decls.interfaces.get(id.index()).copied();
                self.found_or_unresolved(found, span)
            }
            TypeExpr::Enum(id) => {
                let found = self.decls.enums.get(id.index()).copied();
                self.found_or_unresolved(found, span)
            }
            TypeExpr::Alias(id) => {
                let found = self.decls.aliases.get(id.index()).copied();
                self.found_or_unresolved(found, span)
            }
            TypeExpr::Param(index) => match self.generic_scope.get(*index as usize).copied() {
                Some(param) => param,
                None => {
                    self.error(CheckError::UnresolvedReference { span });
                    TypeId::INVALID
                }
            },
            TypeExpr::Array(element) => {
                let element = self.resolve_type(element, span);
                if element == TypeId::INVALID {
                    return TypeId::INVALID;
                }
                self.ctx.array_type(element)
            }
            TypeExpr::Union(members) => {
                let members = members.iter().map(|m| self.resolve_type(m, span)).collect();
                self.ctx.union_type(members)
            }
            TypeExpr::Function { params, ret } => {
                let params = params.iter().map(|p| self.resolve_type(p, span)).collect();
                let ret = self.resolve_type(ret, span);
                self.ctx.function_type(params, ret)
            }
        }
    }

    fn found_or_unresolved(&mut self, found: Option<TypeId>, span: Span) -> TypeId {
        match found {
            Some(ty) => ty,
            None => {
                self.error(CheckError::UnresolvedReference { span });
                TypeId::INVALID
            }
        }
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn check_function(&mut self, module: &mut Module, id: FunctionId) {
        let decl = module.function(id);
        let name = decl.name.clone();
        let span = decl.span;
        let kind = decl.kind;
        let param_locals: Vec<LocalId> = decl.params.iter().map(|p| p.local).collect();
        let local_names: Vec<String> = decl.locals.iter().map(|l| l.name.clone()).collect();

        let signature = self.decls.signature(id);
        let (param_types, return_type) = match self.ctx.function(signature) {
            Some(f) => (f.params.clone(), f.return_type),
            None => return,
        };

        let this_type = kind.owner().map(|c| self.decls.class(c));
        self.enter_class_scope(kind.owner());

        let mut local_types = vec![TypeId::INVALID; local_names.len()];
        let mut bound = vec![false; local_names.len()];
        for (local, ty) in param_locals.iter().zip(&param_types) {
            if let Some(slot) = local_types.get_mut(local.index()) {
                *slot = *ty;
                bound[local.index()] = true;
            }
        }

        self.current = Some(FunctionState {
            return_type,
            this_type,
            local_types,
            local_names,
            bound,
        });
        self.refinements.clear();

        let mut body = std::mem::take(&mut module.functions[id.index()].body);
        let returns = self.check_block(&mut body);

        let state = self.current.take();
        let needs_value = !matches!(self.ctx.unalias(return_type), TypeId::VOID | TypeId::INVALID);
        if needs_value && !returns {
            self.error(CheckError::MissingReturn { name, span });
        }

        let function = &mut module.functions[id.index()];
        function.body = body;
        if let Some(state) = state {
            function.local_types = state.local_types;
        }
        self.generic_scope.clear();
    }

    pub(super) fn state(&self) -> Option<&FunctionState> {
        self.current.as_ref()
    }

    /// Declared type of a local in the current function
    pub(super) fn local_type(&self, local: LocalId) -> TypeId {
        self.state()
            .and_then(|s| s.local_types.get(local.index()).copied())
            .unwrap_or(TypeId::INVALID)
    }

    pub(super) fn is_bound(&self, local: LocalId) -> bool {
        self.state()
            .and_then(|s| s.bound.get(local.index()).copied())
            .unwrap_or(false)
    }

    pub(super) fn local_name(&self, local: LocalId) -> String {
        self.state()
            .and_then(|s| s.local_names.get(local.index()).cloned())
            .unwrap_or_else(|| format!("local{}", local.0))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Check a block; returns whether it returns on every path
    pub(super) fn check_block(&mut self, block: &mut Block) -> bool {
        self.refinements.push();
        let mut returns = false;
        let mut warned = false;
        for stmt in &mut block.stmts {
            if returns && !warned {
                self.warn(CheckWarning::UnreachableCode { span: stmt.span() });
                warned = true;
            }
            returns |= self.check_stmt(stmt);
        }
        self.refinements.pop();
        returns
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> bool {
        match stmt {
            Stmt::Let(s) => {
                self.check_let(s);
                false
            }
            Stmt::Expr(e) => {
                self.check_expr(e, None);
                false
            }
            Stmt::Return(s) => {
                self.check_return(s);
                true
            }
            Stmt::If(s) => self.check_if(s),
            Stmt::While(s) => {
                self.check_while(s);
                false
            }
            Stmt::Block(b) => self.check_block(b),
        }
    }

    fn check_let(&mut self, stmt: &mut LetStmt) {
        let declared = stmt.ty.as_ref().map(|ty| self.resolve_type(ty, stmt.span));
        let ty = match (&mut stmt.init, declared) {
            (Some(init), Some(declared)) => {
                self.check_expr(init, Some(declared));
                self.coerce(init, declared);
                declared
            }
            (Some(init), None) => {
                let ty = self.check_expr(init, None);
                if self.ctx.unalias(ty) == TypeId::VOID {
                    self.error(CheckError::VoidValue { span: init.span });
                    TypeId::INVALID
                } else {
                    ty
                }
            }
            (None, Some(declared)) => declared,
            (None, None) => {
                let name = self.local_name(stmt.local);
                self.error(CheckError::UntypedLocal { name, span: stmt.span });
                TypeId::INVALID
            }
        };

        stmt.resolved = ty;
        if let Some(state) = self.current.as_mut() {
            if let Some(slot) = state.local_types.get_mut(stmt.local.index()) {
                *slot = ty;
                state.bound[stmt.local.index()] = true;
            }
        }
        self.refinements.invalidate(stmt.local);
    }

    fn check_return(&mut self, stmt: &mut ReturnStmt) {
        let return_type = self.state().map(|s| s.return_type).unwrap_or(TypeId::INVALID);
        let is_void = self.ctx.unalias(return_type) == TypeId::VOID;
        match (&mut stmt.value, is_void) {
            (Some(value), false) => {
                self.check_expr(value, Some(return_type));
                self.coerce(value, return_type);
            }
            (Some(value), true) => {
                let actual = self.check_expr(value, None);
                if !self.ctx.is_invalid(actual) {
                    self.error(CheckError::TypeMismatch {
                        expected: "void".to_string(),
                        actual: self.display(actual),
                        span: value.span,
                    });
                }
            }
            (None, false) => {
                if !self.ctx.is_invalid(return_type) {
                    self.error(CheckError::TypeMismatch {
                        expected: self.display(return_type),
                        actual: "void".to_string(),
                        span: stmt.span,
                    });
                }
            }
            (None, true) => {}
        }
    }

    fn check_condition(&mut self, condition: &mut Expr) {
        self.check_expr(condition, Some(TypeId::BOOL));
        self.coerce(condition, TypeId::BOOL);
    }

    fn check_if(&mut self, stmt: &mut IfStmt) -> bool {
        self.check_condition(&mut stmt.condition);
        let narrowing = self.narrowing_of(&stmt.condition);

        self.refinements.push();
        if let Some((local, when_true, _)) = narrowing {
            self.refinements.refine(local, when_true);
        }
        let then_returns = self.check_block(&mut stmt.then_branch);
        self.refinements.pop();

        let else_returns = match &mut stmt.else_branch {
            Some(else_branch) => {
                self.refinements.push();
                if let Some((local, _, Some(when_false))) = narrowing {
                    self.refinements.refine(local, when_false);
                }
                let returns = self.check_block(else_branch);
                self.refinements.pop();
                returns
            }
            None => false,
        };

        then_returns && else_returns
    }

    /// Refinements implied by an `is` condition: (local, true type, false type)
    fn narrowing_of(&self, condition: &Expr) -> Option<(LocalId, TypeId, Option<TypeId>)> {
        let ExprKind::Is {
            operand,
            check: IsCheck::UnionTag(tag),
            ..
        } = &condition.kind
        else {
            return None;
        };
        let (ExprKind::Ident, Some(DeclRef::Local(local))) = (&operand.kind, operand.referenced) else {
            return None;
        };
        let union = operand.ty;
        let member = *self.ctx.union(union)?.members.get(*tag as usize)?;
        Some((local, member, narrowing::complement(&*self.ctx, union, member)))
    }

    fn check_while(&mut self, stmt: &mut WhileStmt) {
        // A later iteration may observe assignments made by an earlier one
        for local in narrowing::assigned_locals(&stmt.body) {
            self.refinements.invalidate(local);
        }
        self.check_condition(&mut stmt.condition);
        self.check_block(&mut stmt.body);
    }
}
