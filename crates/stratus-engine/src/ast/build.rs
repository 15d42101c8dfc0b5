//! Helpers for constructing resolved syntax trees
//!
//! Front ends and tests use these instead of filling in node structs by
//! hand. Nodes built through a [`FunctionBuilder`] are stamped with the
//! builder's current line.

use super::*;
use crate::diagnostic::Span;

/// Incrementally builds a [`Module`]
pub struct ModuleBuilder {
    module: Module,
    line: u32,
}

impl ModuleBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            module: Module::new(path),
            line: 1,
        }
    }

    /// Set the line attached to declarations created next
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    fn span(&self) -> Span {
        Span::line(self.line)
    }

    fn push_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        params: &[(&str, TypeExpr)],
        return_type: TypeExpr,
    ) -> FunctionId {
        let span = self.span();
        let locals = params
            .iter()
            .map(|(name, _)| LocalDecl {
                name: (*name).to_string(),
                span,
            })
            .collect();
        let params = params
            .iter()
            .enumerate()
            .map(|(i, (_, ty))| Param {
                local: LocalId(i as u32),
                ty: ty.clone(),
            })
            .collect();
        let id = FunctionId(self.module.functions.len() as u32);
        self.module.functions.push(FunctionDecl {
            name: name.to_string(),
            kind,
            params,
            return_type,
            locals,
            body: Block::default(),
            span,
            local_types: Vec::new(),
        });
        id
    }

    /// Declare a free function whose body is supplied later with [`ModuleBuilder::define`]
    pub fn declare_function(&mut self, name: &str, params: &[(&str, TypeExpr)], ret: TypeExpr) -> FunctionId {
        self.push_function(name, FunctionKind::Free, params, ret)
    }

    /// Supply the body of a previously declared function
    pub fn define(&mut self, id: FunctionId, body: impl FnOnce(&mut FunctionBuilder<'_>)) {
        let line = self.line;
        let mut builder = FunctionBuilder {
            decl: &mut self.module.functions[id.index()],
            stmts: Vec::new(),
            line,
        };
        body(&mut builder);
        let FunctionBuilder { decl, stmts, .. } = builder;
        decl.body = Block {
            stmts,
            span: Span::line(line),
        };
    }

    pub fn function(
        &mut self,
        name: &str,
        params: &[(&str, TypeExpr)],
        ret: TypeExpr,
        body: impl FnOnce(&mut FunctionBuilder<'_>),
    ) -> FunctionId {
        let id = self.declare_function(name, params, ret);
        self.define(id, body);
        id
    }

    pub fn class(&mut self, name: &str) -> ClassId {
        self.generic_class(name, &[])
    }

    pub fn generic_class(&mut self, name: &str, params: &[&str]) -> ClassId {
        let id = ClassId(self.module.classes.len() as u32);
        self.module.classes.push(ClassDecl {
            name: name.to_string(),
            generic_params: params.iter().map(|p| (*p).to_string()).collect(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            span: self.span(),
        });
        id
    }

    pub fn field(&mut self, class: ClassId, name: &str, ty: TypeExpr) {
        let span = self.span();
        self.module.classes[class.index()].fields.push(FieldDecl {
            name: name.to_string(),
            ty,
            span,
        });
    }

    pub fn declare_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[(&str, TypeExpr)],
        ret: TypeExpr,
    ) -> FunctionId {
        let id = self.push_function(name, FunctionKind::Method(class), params, ret);
        self.module.classes[class.index()].methods.push(id);
        id
    }

    pub fn method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[(&str, TypeExpr)],
        ret: TypeExpr,
        body: impl FnOnce(&mut FunctionBuilder<'_>),
    ) -> FunctionId {
        let id = self.declare_method(class, name, params, ret);
        self.define(id, body);
        id
    }

    pub fn constructor(
        &mut self,
        class: ClassId,
        params: &[(&str, TypeExpr)],
        body: impl FnOnce(&mut FunctionBuilder<'_>),
    ) -> FunctionId {
        let name = self.module.classes[class.index()].name.clone();
        let id = self.push_function(&name, FunctionKind::Constructor(class), params, TypeExpr::Void);
        self.module.classes[class.index()].constructors.push(id);
        self.define(id, body);
        id
    }

    pub fn interface(&mut self, name: &str) -> InterfaceId {
        let id = InterfaceId(self.module.interfaces.len() as u32);
        self.module.interfaces.push(InterfaceDecl {
            name: name.to_string(),
            methods: Vec::new(),
            fields: Vec::new(),
            span: self.span(),
        });
        id
    }

    pub fn interface_method(&mut self, iface: InterfaceId, name: &str, params: Vec<TypeExpr>, ret: TypeExpr) {
        let span = self.span();
        self.module.interfaces[iface.index()].methods.push(InterfaceMethodDecl {
            name: name.to_string(),
            params,
            return_type: ret,
            span,
        });
    }

    pub fn interface_field(&mut self, iface: InterfaceId, name: &str, ty: TypeExpr) {
        let span = self.span();
        self.module.interfaces[iface.index()].fields.push(FieldDecl {
            name: name.to_string(),
            ty,
            span,
        });
    }

    pub fn enumeration(&mut self, name: &str, elements: &[&str]) -> EnumId {
        let id = EnumId(self.module.enums.len() as u32);
        self.module.enums.push(EnumDecl {
            name: name.to_string(),
            elements: elements.iter().map(|e| (*e).to_string()).collect(),
            span: self.span(),
        });
        id
    }

    pub fn alias(&mut self, name: &str, aliased: TypeExpr) -> AliasId {
        let id = AliasId(self.module.aliases.len() as u32);
        self.module.aliases.push(AliasDecl {
            name: name.to_string(),
            aliased,
            span: self.span(),
        });
        id
    }

    pub fn foreign(&mut self, name: &str, params: Vec<TypeExpr>, ret: TypeExpr) -> ForeignId {
        let id = ForeignId(self.module.foreign_functions.len() as u32);
        self.module.foreign_functions.push(ForeignDecl {
            name: name.to_string(),
            params,
            return_type: ret,
            span: self.span(),
        });
        id
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

/// Appends statements to a function body
pub struct FunctionBuilder<'a> {
    decl: &'a mut FunctionDecl,
    stmts: Vec<Stmt>,
    line: u32,
}

impl FunctionBuilder<'_> {
    /// Set the line attached to statements appended next
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    fn span(&self) -> Span {
        Span::line(self.line)
    }

    /// Local slot of the `index`th parameter
    pub fn param(&self, index: usize) -> LocalId {
        self.decl.params[index].local
    }

    /// Declare a local without emitting a `let`
    pub fn local(&mut self, name: &str) -> LocalId {
        let id = LocalId(self.decl.locals.len() as u32);
        self.decl.locals.push(LocalDecl {
            name: name.to_string(),
            span: self.span(),
        });
        id
    }

    /// `let name: ty = init`
    pub fn let_var(&mut self, name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> LocalId {
        let local = self.local(name);
        let span = self.span();
        let init = init.map(|e| stamp(e, span));
        self.stmts.push(Stmt::Let(LetStmt {
            local,
            ty,
            init,
            span,
            resolved: crate::types::TypeId::INVALID,
        }));
        local
    }

    pub fn expr(&mut self, expr: Expr) {
        let expr = stamp(expr, self.span());
        self.stmts.push(Stmt::Expr(expr));
    }

    pub fn ret(&mut self, value: Expr) {
        let span = self.span();
        self.stmts.push(Stmt::Return(ReturnStmt {
            value: Some(stamp(value, span)),
            span,
        }));
    }

    pub fn ret_void(&mut self) {
        let span = self.span();
        self.stmts.push(Stmt::Return(ReturnStmt { value: None, span }));
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self)) -> Block {
        let span = self.span();
        let saved = std::mem::take(&mut self.stmts);
        body(self);
        let stmts = std::mem::replace(&mut self.stmts, saved);
        Block { stmts, span }
    }

    pub fn if_then(&mut self, condition: Expr, then: impl FnOnce(&mut Self)) {
        let span = self.span();
        let condition = stamp(condition, span);
        let then_branch = self.nested(then);
        self.stmts.push(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch: None,
            span,
        }));
    }

    pub fn if_else(&mut self, condition: Expr, then: impl FnOnce(&mut Self), otherwise: impl FnOnce(&mut Self)) {
        let span = self.span();
        let condition = stamp(condition, span);
        let then_branch = self.nested(then);
        let else_branch = self.nested(otherwise);
        self.stmts.push(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch: Some(else_branch),
            span,
        }));
    }

    pub fn while_loop(&mut self, condition: Expr, body: impl FnOnce(&mut Self)) {
        let span = self.span();
        let condition = stamp(condition, span);
        let body = self.nested(body);
        self.stmts.push(Stmt::While(WhileStmt { condition, body, span }));
    }

    pub fn block(&mut self, body: impl FnOnce(&mut Self)) {
        let block = self.nested(body);
        self.stmts.push(Stmt::Block(block));
    }
}

/// Give every node without a location the span `span`
fn stamp(mut expr: Expr, span: Span) -> Expr {
    stamp_in_place(&mut expr, span);
    expr
}

fn stamp_in_place(expr: &mut Expr, span: Span) {
    if expr.span == Span::default() {
        expr.span = span;
    }
    if let Some(ctx) = expr.implicit_context.as_deref_mut() {
        stamp_in_place(ctx, span);
    }
    match &mut expr.kind {
        ExprKind::Member { object, .. } => stamp_in_place(object, span),
        ExprKind::Index { object, index } => {
            stamp_in_place(object, span);
            stamp_in_place(index, span);
        }
        ExprKind::Call { callee, args } => {
            stamp_in_place(callee, span);
            args.iter_mut().for_each(|a| stamp_in_place(a, span));
        }
        ExprKind::Unary { operand, .. } => stamp_in_place(operand, span),
        ExprKind::Binary { left, right, .. } => {
            stamp_in_place(left, span);
            stamp_in_place(right, span);
        }
        ExprKind::Assign { target, value, .. } => {
            stamp_in_place(target, span);
            stamp_in_place(value, span);
        }
        ExprKind::Is { operand, .. } | ExprKind::Cast { operand, .. } => stamp_in_place(operand, span),
        ExprKind::Coerce(c) => stamp_in_place(&mut c.source, span),
        ExprKind::Array(elements) => elements.iter_mut().for_each(|e| stamp_in_place(e, span)),
        _ => {}
    }
}

// ============================================================================
// Expression constructors
// ============================================================================

pub fn int(value: i64) -> Expr {
    Expr::new(ExprKind::Int(value))
}

pub fn float(value: f64) -> Expr {
    Expr::new(ExprKind::Float(value))
}

pub fn string(value: &str) -> Expr {
    Expr::new(ExprKind::Str(value.to_string()))
}

pub fn boolean(value: bool) -> Expr {
    Expr::new(ExprKind::Bool(value))
}

pub fn null() -> Expr {
    Expr::new(ExprKind::Null)
}

pub fn var(local: LocalId) -> Expr {
    Expr::new(ExprKind::Ident).with_ref(DeclRef::Local(local))
}

pub fn func(function: FunctionId) -> Expr {
    Expr::new(ExprKind::Ident).with_ref(DeclRef::Function(function))
}

/// An identifier naming several overloaded functions
pub fn overloads(functions: &[FunctionId]) -> Expr {
    let mut expr = Expr::new(ExprKind::Ident);
    expr.candidates = functions.iter().map(|f| DeclRef::Function(*f)).collect();
    expr
}

/// A bare method name resolved inside a class body; the receiver is `this`
pub fn self_method(methods: &[FunctionId]) -> Expr {
    let mut expr = overloads(methods);
    expr.implicit_context = Some(Box::new(this()));
    expr
}

pub fn foreign(id: ForeignId) -> Expr {
    Expr::new(ExprKind::Ident).with_ref(DeclRef::Foreign(id))
}

pub fn enum_element(enumeration: EnumId, index: u32) -> Expr {
    Expr::new(ExprKind::Ident).with_ref(DeclRef::EnumElement { enumeration, index })
}

pub fn this() -> Expr {
    Expr::new(ExprKind::This)
}

pub fn type_value(ty: TypeExpr) -> Expr {
    Expr::new(ExprKind::TypeValue(ty))
}

/// Constructor call
pub fn new(ty: TypeExpr, args: Vec<Expr>) -> Expr {
    call(type_value(ty), args)
}

pub fn member(object: Expr, name: &str) -> Expr {
    Expr::new(ExprKind::Member {
        object: Box::new(object),
        name: name.to_string(),
    })
}

pub fn index(object: Expr, index: Expr) -> Expr {
    Expr::new(ExprKind::Index {
        object: Box::new(object),
        index: Box::new(index),
    })
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call {
        callee: Box::new(callee),
        args,
    })
}

/// `object.name(args)`
pub fn call_method(object: Expr, name: &str, args: Vec<Expr>) -> Expr {
    call(member(object, name), args)
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::new(ExprKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Mul, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Lt, left, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    Expr::new(ExprKind::Assign {
        op: None,
        target: Box::new(target),
        value: Box::new(value),
    })
}

pub fn compound(op: BinaryOp, target: Expr, value: Expr) -> Expr {
    Expr::new(ExprKind::Assign {
        op: Some(op),
        target: Box::new(target),
        value: Box::new(value),
    })
}

pub fn is(operand: Expr, target: TypeExpr) -> Expr {
    Expr::new(ExprKind::Is {
        operand: Box::new(operand),
        target,
        check: IsCheck::Unresolved,
    })
}

pub fn cast(operand: Expr, target: TypeExpr) -> Expr {
    Expr::new(ExprKind::Cast {
        operand: Box::new(operand),
        target,
    })
}

pub fn array(elements: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Array(elements))
}

/// Attach an explicit location to an expression
pub fn at(expr: Expr, line: u32, column: u32) -> Expr {
    expr.with_span(Span::new(line, column))
}
