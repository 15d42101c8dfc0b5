//! Calls, construction and interface objects

use super::fixup::FnKey;
use super::function::FunctionContext;
use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::CompileResult;
use crate::compiler::layout::INTERFACE_METHODS;
use crate::types::{Implementation, TypeId};

impl Compiler<'_> {
    pub(super) fn compile_call(
        &mut self,
        fc: &mut FunctionContext,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
    ) -> CompileResult<()> {
        match (&callee.kind, callee.referenced) {
            // Construction: allocate, then run the constructor on a copy of the reference
            (ExprKind::TypeValue(_), constructor) => {
                let class = self.ty(fc, expr.ty);
                let layout = self.layouts.layout_of(&*self.ctx, class)?;
                self.emit_with_u32(Opcode::New, layout);
                if let Some(DeclRef::Function(constructor)) = constructor {
                    self.emit(Opcode::Dup);
                    self.compile_args(fc, args)?;
                    let key = self.method_key(constructor, class);
                    self.emit_call(key, args.len() + 1)?;
                }
            }
            (ExprKind::Member { object, .. }, Some(DeclRef::Function(method))) => {
                self.compile_expr(fc, object)?;
                self.compile_args(fc, args)?;
                let receiver = self.ty(fc, object.ty);
                let key = self.method_key(method, receiver);
                self.emit_call(key, args.len() + 1)?;
            }
            (ExprKind::Member { object, .. }, Some(DeclRef::InterfaceMethod(slot))) => {
                // receiver from slot 0, then the bound address from the method slot
                self.compile_expr(fc, object)?;
                let iface = fc.alloc_temp()?;
                self.emit_with_u16(Opcode::StoreLocal, iface);
                let argc = self.argc(args.len() + 1, expr)?;
                self.emit_with_u16(Opcode::LoadLocal, iface);
                self.emit_with_u32(Opcode::LoadRef, 0);
                self.compile_args(fc, args)?;
                self.emit_with_u16(Opcode::LoadLocal, iface);
                self.emit_with_u32(Opcode::LoadI64, INTERFACE_METHODS + 8 * slot);
                self.emit_with_u8(Opcode::CallIndirect, argc);
                fc.free_temp();
            }
            (ExprKind::Member { object, .. }, field @ Some(DeclRef::Field(_) | DeclRef::InterfaceField(_))) => {
                // Function value stored in a field
                let (kind, offset) = self.field_slot(fc, object.ty, field, callee)?;
                self.compile_expr(fc, object)?;
                self.emit_load(kind, offset);
                self.call_value(fc, args, expr)?;
            }
            (ExprKind::Ident, Some(DeclRef::Function(function))) => match self.function_kind(function) {
                FunctionKind::Free => {
                    self.compile_args(fc, args)?;
                    self.emit_call(FnKey::plain(function), args.len())?;
                }
                _ => {
                    let context = callee
                        .implicit_context
                        .as_deref()
                        .ok_or_else(|| self.unlowerable("method call without a receiver", callee))?;
                    self.compile_expr(fc, context)?;
                    self.compile_args(fc, args)?;
                    let receiver = self.ty(fc, context.ty);
                    let key = self.method_key(function, receiver);
                    self.emit_call(key, args.len() + 1)?;
                }
            },
            (ExprKind::Ident, Some(DeclRef::Foreign(id))) => {
                self.compile_args(fc, args)?;
                self.emit_with_u32(Opcode::NativeCall, id.0);
            }
            _ => {
                self.compile_expr(fc, callee)?;
                self.call_value(fc, args, expr)?;
            }
        }
        Ok(())
    }

    fn compile_args(&mut self, fc: &mut FunctionContext, args: &[Expr]) -> CompileResult<()> {
        for arg in args {
            self.compile_expr(fc, arg)?;
        }
        Ok(())
    }

    fn argc(&self, argc: usize, expr: &Expr) -> CompileResult<u8> {
        u8::try_from(argc).map_err(|_| self.unlowerable("call with more than 255 arguments", expr))
    }

    /// Call the function address on top of the stack with `args`
    fn call_value(&mut self, fc: &mut FunctionContext, args: &[Expr], expr: &Expr) -> CompileResult<()> {
        let argc = self.argc(args.len(), expr)?;
        let target = fc.alloc_temp()?;
        self.emit_with_u16(Opcode::StoreLocal, target);
        self.compile_args(fc, args)?;
        self.emit_with_u16(Opcode::LoadLocal, target);
        self.emit_with_u8(Opcode::CallIndirect, argc);
        fc.free_temp();
        Ok(())
    }

    /// Build an interface object around the class instance on the stack
    ///
    /// The receiver goes in slot 0, each bound method's address in its
    /// method slot, and each bound field is copied into its field slot.
    pub(super) fn compile_to_interface(
        &mut self,
        fc: &mut FunctionContext,
        class: TypeId,
        interface: TypeId,
        implementation: &Implementation,
    ) -> CompileResult<()> {
        let iface_layout = self.layouts.layout_of(&*self.ctx, interface)?;
        let class_layout = self.layouts.layout_of(&*self.ctx, class)?;

        let source = fc.alloc_temp()?;
        self.emit_with_u16(Opcode::StoreLocal, source);
        self.emit_with_u32(Opcode::InterfaceNew, iface_layout);
        self.emit(Opcode::Dup);
        self.emit_with_u16(Opcode::LoadLocal, source);
        self.emit_with_u32(Opcode::StoreRef, 0);

        for binding in &implementation.method_bindings {
            let key = self.method_key(binding.function, class);
            let address = self.address_constant(key);
            self.emit(Opcode::Dup);
            self.emit_with_u32(Opcode::PushConst, address);
            self.emit_with_u32(Opcode::Store64, INTERFACE_METHODS + 8 * binding.slot);
        }

        for binding in &implementation.field_bindings {
            let from = self.layouts.get(class_layout).and_then(|l| l.field(binding.field as usize));
            let to = self.layouts.get(iface_layout).and_then(|l| l.field(binding.slot as usize));
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            self.emit(Opcode::Dup);
            self.emit_with_u16(Opcode::LoadLocal, source);
            self.emit_load(from.kind, from.offset);
            self.emit_store(to.kind, to.offset);
        }
        fc.free_temp();
        Ok(())
    }
}
