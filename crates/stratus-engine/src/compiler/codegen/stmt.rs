//! Statement lowering

use super::function::FunctionContext;
use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::CompileResult;
use crate::types::{Type, TypeId};

impl Compiler<'_> {
    pub(super) fn compile_block(&mut self, fc: &mut FunctionContext, block: &Block) -> CompileResult<()> {
        for stmt in &block.stmts {
            self.compile_stmt(fc, stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, fc: &mut FunctionContext, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Let(stmt) => {
                let slot = fc.local_slot(stmt.local);
                match &stmt.init {
                    Some(init) => self.compile_expr(fc, init)?,
                    None => {
                        let ty = self.ty(fc, stmt.resolved);
                        self.push_default(ty)?;
                    }
                }
                self.emit_with_u16(Opcode::StoreLocal, slot);
            }
            Stmt::Expr(expr) => {
                if let ExprKind::Assign { .. } = expr.kind {
                    self.compile_assign(fc, expr, false)?;
                } else {
                    self.compile_expr(fc, expr)?;
                    let ty = self.ty(fc, expr.ty);
                    if !self.is_void(ty) {
                        self.emit(Opcode::Pop);
                    }
                }
            }
            Stmt::Return(ret) => match &ret.value {
                Some(value) => {
                    self.compile_expr(fc, value)?;
                    self.emit(Opcode::Return);
                }
                None => self.emit(Opcode::ReturnVoid),
            },
            Stmt::If(stmt) => {
                self.compile_expr(fc, &stmt.condition)?;
                let otherwise = self.emit_jump(Opcode::JumpIfFalse);
                self.compile_block(fc, &stmt.then_branch)?;
                match &stmt.else_branch {
                    Some(else_branch) => {
                        let end = self.emit_jump(Opcode::Jump);
                        self.bind(otherwise);
                        self.compile_block(fc, else_branch)?;
                        self.bind(end);
                    }
                    None => self.bind(otherwise),
                }
            }
            Stmt::While(stmt) => {
                let top = self.code.position();
                self.compile_expr(fc, &stmt.condition)?;
                let exit = self.emit_jump(Opcode::JumpIfFalse);
                self.compile_block(fc, &stmt.body)?;
                self.emit_loop(top);
                self.bind(exit);
            }
            Stmt::Block(block) => self.compile_block(fc, block)?,
        }
        Ok(())
    }

    /// Zero value of a slot declared without an initializer
    ///
    /// A union that admits `null` starts as a boxed null; any other
    /// reference starts as a null reference.
    pub(super) fn push_default(&mut self, ty: TypeId) -> CompileResult<()> {
        match self.ctx.resolved(ty).clone() {
            Type::Bool => self.push_bool(false),
            Type::Float(_) => self.push_float(0.0, true),
            Type::Int(_) | Type::Enum(_) | Type::Pointer | Type::Function(_) => self.push_int(0),
            Type::Union(union) => {
                self.emit(Opcode::PushNull);
                if let Some(tag) = union.tag_of(TypeId::NULL) {
                    let layout = self.layouts.layout_of(&*self.ctx, ty)?;
                    self.emit(Opcode::MakeUnion);
                    self.code.emit_u32(layout);
                    self.code.emit_u32(tag);
                }
            }
            _ => self.emit(Opcode::PushNull),
        }
        Ok(())
    }
}
