//! Expression lowering
//!
//! Every expression leaves exactly one value on the operand stack, except
//! calls whose result type is `void`, which leave nothing.

use super::fixup::FnKey;
use super::function::{CompoundTarget, FunctionContext};
use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::layout::{slot_kind, SlotKind};
use crate::types::TypeId;

impl Compiler<'_> {
    pub(super) fn compile_expr(&mut self, fc: &mut FunctionContext, expr: &Expr) -> CompileResult<()> {
        if let Some(value) = self.fold(fc, expr) {
            self.push_folded(value);
            return Ok(());
        }

        match &expr.kind {
            ExprKind::Int(value) => self.push_int(*value),
            ExprKind::Float(value) => {
                let ty = self.ty(fc, expr.ty);
                self.push_float(*value, ty == TypeId::F32);
            }
            ExprKind::Str(value) => {
                let index = self.constants.add_string(value);
                self.emit_with_u32(Opcode::PushConst, index);
            }
            ExprKind::Bool(value) => self.push_bool(*value),
            ExprKind::Null | ExprKind::TypeValue(_) => self.emit(Opcode::PushNull),
            ExprKind::This => self.emit_with_u16(Opcode::LoadLocal, 0),
            ExprKind::Ident => self.compile_ident(fc, expr)?,
            ExprKind::Member { object, name } => self.compile_member(fc, expr, object, name)?,
            ExprKind::Index { object, index } => self.compile_index(fc, expr, object, index)?,
            ExprKind::Call { callee, args } => self.compile_call(fc, expr, callee, args)?,
            ExprKind::Unary { op, operand } => {
                self.compile_expr(fc, operand)?;
                let ty = self.ty(fc, operand.ty);
                let opcode = match op {
                    UnaryOp::Not => Opcode::Not,
                    UnaryOp::BitNot => Opcode::INot,
                    UnaryOp::Neg => match self.ctx.float(ty) {
                        Some(f) if f.width == 32 => Opcode::F32Neg,
                        Some(_) => Opcode::F64Neg,
                        None => Opcode::INeg,
                    },
                };
                self.emit(opcode);
            }
            ExprKind::Binary { op, left, right } => self.compile_binary(fc, expr, *op, left, right)?,
            ExprKind::Assign { .. } => self.compile_assign(fc, expr, true)?,
            ExprKind::Is { operand, check, .. } => {
                self.compile_expr(fc, operand)?;
                match check {
                    IsCheck::Always => {
                        self.emit(Opcode::Pop);
                        self.push_bool(true);
                    }
                    IsCheck::UnionTag(tag) => self.emit_with_u32(Opcode::IsTag, *tag),
                    IsCheck::Unresolved => return Err(self.unlowerable("unresolved type test", expr)),
                }
            }
            ExprKind::Coerce(coercion) => {
                self.compile_expr(fc, &coercion.source)?;
                self.compile_coercion(fc, expr, coercion)?;
            }
            ExprKind::Array(elements) => {
                let ty = self.ty(fc, expr.ty);
                let layout = self.layouts.layout_of(&*self.ctx, ty)?;
                let element = self.element_kind(ty)?;
                self.push_int(elements.len() as i64);
                self.emit_with_u32(Opcode::Array, layout);
                for (i, item) in elements.iter().enumerate() {
                    self.emit(Opcode::Dup);
                    self.push_int(i as i64);
                    self.compile_expr(fc, item)?;
                    self.emit_with_u8(Opcode::StoreElem, element as u8);
                }
            }
            ExprKind::CompoundOperand => match fc.compound {
                Some(CompoundTarget::Local(slot)) => self.emit_with_u16(Opcode::LoadLocal, slot),
                Some(CompoundTarget::Field { object, offset, kind }) => {
                    self.emit_with_u16(Opcode::LoadLocal, object);
                    self.emit_load(kind, offset);
                }
                Some(CompoundTarget::Element { array, index, kind }) => {
                    self.emit_with_u16(Opcode::LoadLocal, array);
                    self.emit_with_u16(Opcode::LoadLocal, index);
                    self.emit_with_u8(Opcode::LoadElem, kind as u8);
                }
                None => return Err(self.unlowerable("compound operand outside an assignment", expr)),
            },
            ExprKind::Cast { .. } => return Err(self.unlowerable("unchecked cast", expr)),
        }
        Ok(())
    }

    pub(super) fn unlowerable(&self, what: &str, expr: &Expr) -> CompileError {
        CompileError::Unlowerable {
            what: what.to_string(),
            span: expr.span,
        }
    }

    fn compile_ident(&mut self, fc: &mut FunctionContext, expr: &Expr) -> CompileResult<()> {
        match expr.referenced {
            Some(DeclRef::Local(local)) => self.emit_with_u16(Opcode::LoadLocal, fc.local_slot(local)),
            Some(DeclRef::Function(function)) => {
                let slot = self.address_constant(FnKey::plain(function));
                self.emit_with_u32(Opcode::PushConst, slot);
            }
            Some(DeclRef::EnumElement { index, .. }) => self.push_int(i64::from(index)),
            _ => return Err(self.unlowerable("reference", expr)),
        }
        Ok(())
    }

    /// Slot kind and offset of a class or interface field
    pub(super) fn field_slot(
        &mut self,
        fc: &FunctionContext,
        object_ty: TypeId,
        decl: Option<DeclRef>,
        expr: &Expr,
    ) -> CompileResult<(SlotKind, u32)> {
        let index = match decl {
            Some(DeclRef::Field(i)) | Some(DeclRef::InterfaceField(i)) => i as usize,
            _ => return Err(self.unlowerable("member access", expr)),
        };
        let object_ty = self.ty(fc, object_ty);
        let layout = self.layouts.layout_of(&*self.ctx, object_ty)?;
        self.layouts
            .get(layout)
            .and_then(|l| l.field(index))
            .map(|slot| (slot.kind, slot.offset))
            .ok_or_else(|| self.unlowerable("field without a slot", expr))
    }

    fn compile_member(&mut self, fc: &mut FunctionContext, expr: &Expr, object: &Expr, name: &str) -> CompileResult<()> {
        self.compile_expr(fc, object)?;
        if expr.referenced.is_none() && name == "length" {
            self.emit(Opcode::ArrayLen);
            return Ok(());
        }
        let (kind, offset) = self.field_slot(fc, object.ty, expr.referenced, expr)?;
        self.emit_load(kind, offset);
        Ok(())
    }

    /// Element kind of an array, or of a string's bytes
    pub(super) fn element_kind(&mut self, container: TypeId) -> CompileResult<SlotKind> {
        if self.ctx.is_string(container) {
            return Ok(SlotKind::U8);
        }
        match self.ctx.array_element(container) {
            Some(element) => slot_kind(&*self.ctx, element),
            None => Err(CompileError::UnsizedType {
                ty: self.ctx.display(container),
            }),
        }
    }

    fn compile_index(&mut self, fc: &mut FunctionContext, expr: &Expr, object: &Expr, index: &Expr) -> CompileResult<()> {
        self.compile_expr(fc, object)?;
        self.compile_expr(fc, index)?;
        if let Some(DeclRef::Function(function)) = expr.referenced {
            // Subscript operator method
            let receiver = self.ty(fc, object.ty);
            let key = self.method_key(function, receiver);
            return self.emit_call(key, 2);
        }
        let container = self.ty(fc, object.ty);
        let kind = self.element_kind(container)?;
        self.emit_with_u8(Opcode::LoadElem, kind as u8);
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_binary(
        &mut self,
        fc: &mut FunctionContext,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> CompileResult<()> {
        if let Some(DeclRef::Function(function)) = expr.referenced {
            self.compile_expr(fc, left)?;
            self.compile_expr(fc, right)?;
            let receiver = self.ty(fc, left.ty);
            let key = self.method_key(function, receiver);
            return self.emit_call(key, 2);
        }

        if op.family() == OperatorFamily::Logical {
            // Short circuit: the left value is the result when it decides
            self.compile_expr(fc, left)?;
            self.emit(Opcode::Dup);
            let end = self.emit_jump(if op == BinaryOp::And {
                Opcode::JumpIfFalse
            } else {
                Opcode::JumpIfTrue
            });
            self.emit(Opcode::Pop);
            self.compile_expr(fc, right)?;
            self.bind(end);
            return Ok(());
        }

        self.compile_expr(fc, left)?;
        self.compile_expr(fc, right)?;
        let operand = self.ty(fc, left.ty);
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && self.ctx.union(operand).is_some() {
            self.compile_union_equality(operand, expr)?;
            if op == BinaryOp::Ne {
                self.emit(Opcode::Not);
            }
            return Ok(());
        }
        let opcode = self
            .binary_opcode(op, operand)
            .ok_or_else(|| self.unlowerable(&format!("operator '{}'", op.token()), expr))?;
        self.emit(opcode);
        Ok(())
    }

    /// Tag and payload comparison of two boxed values of union type `ty`
    fn compile_union_equality(&mut self, ty: TypeId, expr: &Expr) -> CompileResult<()> {
        let members = self.ctx.union(ty).map(|u| u.members.clone()).unwrap_or_default();
        let mut strings = 0u32;
        for (tag, member) in members.iter().enumerate() {
            if self.ctx.is_string(*member) {
                if tag >= 32 {
                    return Err(self.unlowerable("string comparison in a union of more than 32 members", expr));
                }
                strings |= 1 << tag;
            }
        }
        let layout = self.layouts.layout_of(&*self.ctx, ty)?;
        self.emit(Opcode::UnionEq);
        self.code.emit_u32(layout);
        self.code.emit_u32(strings);
        Ok(())
    }

    /// Opcode for a built-in binary operator on operands of type `operand`
    fn binary_opcode(&self, op: BinaryOp, operand: TypeId) -> Option<Opcode> {
        use BinaryOp::*;
        if self.ctx.is_string(operand) {
            return match op {
                Add => Some(Opcode::StrConcat),
                Eq => Some(Opcode::StrEq),
                Ne => Some(Opcode::StrNe),
                _ => None,
            };
        }
        if let Some(float) = self.ctx.float(operand) {
            let single = float.width == 32;
            return Some(match op {
                Add if single => Opcode::F32Add,
                Sub if single => Opcode::F32Sub,
                Mul if single => Opcode::F32Mul,
                Div if single => Opcode::F32Div,
                Rem if single => Opcode::F32Rem,
                Add => Opcode::F64Add,
                Sub => Opcode::F64Sub,
                Mul => Opcode::F64Mul,
                Div => Opcode::F64Div,
                Rem => Opcode::F64Rem,
                Lt => Opcode::FLt,
                Le => Opcode::FLe,
                Gt => Opcode::FGt,
                Ge => Opcode::FGe,
                Eq => Opcode::Eq,
                Ne => Opcode::Ne,
                _ => return None,
            });
        }
        if let Some(int) = self.ctx.int(operand) {
            let signed = int.signed;
            return Some(match op {
                Add => Opcode::IAdd,
                Sub => Opcode::ISub,
                Mul => Opcode::IMul,
                Div if signed => Opcode::IDiv,
                Div => Opcode::UDiv,
                Rem if signed => Opcode::IRem,
                Rem => Opcode::URem,
                Lt if signed => Opcode::ILt,
                Le if signed => Opcode::ILe,
                Gt if signed => Opcode::IGt,
                Ge if signed => Opcode::IGe,
                Lt => Opcode::ULt,
                Le => Opcode::ULe,
                Gt => Opcode::UGt,
                Ge => Opcode::UGe,
                Eq => Opcode::Eq,
                Ne => Opcode::Ne,
                BitAnd => Opcode::IAnd,
                BitOr => Opcode::IOr,
                BitXor => Opcode::IXor,
                Shl => Opcode::IShl,
                Shr if signed => Opcode::IShr,
                Shr => Opcode::UShr,
                And | Or => return None,
            });
        }
        match op {
            Eq => Some(Opcode::Eq),
            Ne => Some(Opcode::Ne),
            _ => None,
        }
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Store into a local, field or element; leaves the stored value when `keep` is set
    pub(super) fn compile_assign(&mut self, fc: &mut FunctionContext, expr: &Expr, keep: bool) -> CompileResult<()> {
        let ExprKind::Assign { op, target, value } = &expr.kind else {
            return Err(self.unlowerable("assignment", expr));
        };
        let compound = op.is_some();

        match &target.kind {
            ExprKind::Ident => {
                let Some(DeclRef::Local(local)) = target.referenced else {
                    return Err(self.unlowerable("assignment target", target));
                };
                let slot = fc.local_slot(local);
                self.compile_operand(fc, value, compound.then_some(CompoundTarget::Local(slot)))?;
                if keep {
                    self.emit(Opcode::Dup);
                }
                self.emit_with_u16(Opcode::StoreLocal, slot);
            }
            ExprKind::Member { object, .. } => {
                let (kind, offset) = self.field_slot(fc, object.ty, target.referenced, target)?;
                self.compile_expr(fc, object)?;
                let object_temp = if compound {
                    let temp = fc.alloc_temp()?;
                    self.emit_with_u16(Opcode::StoreLocal, temp);
                    self.emit_with_u16(Opcode::LoadLocal, temp);
                    Some(temp)
                } else {
                    None
                };
                let target_state = object_temp.map(|object| CompoundTarget::Field { object, offset, kind });
                self.compile_operand(fc, value, target_state)?;
                let kept = self.keep_value(fc, keep)?;
                self.emit_store(kind, offset);
                self.restore_kept(fc, kept);
                if object_temp.is_some() {
                    fc.free_temp();
                }
            }
            ExprKind::Index { object, index } => {
                let container = self.ty(fc, object.ty);
                let kind = self.element_kind(container)?;
                self.compile_expr(fc, object)?;
                self.compile_expr(fc, index)?;
                let temps = if compound {
                    let array = fc.alloc_temp()?;
                    let idx = fc.alloc_temp()?;
                    self.emit_with_u16(Opcode::StoreLocal, idx);
                    self.emit_with_u16(Opcode::StoreLocal, array);
                    self.emit_with_u16(Opcode::LoadLocal, array);
                    self.emit_with_u16(Opcode::LoadLocal, idx);
                    Some((array, idx))
                } else {
                    None
                };
                let target_state = temps.map(|(array, index)| CompoundTarget::Element { array, index, kind });
                self.compile_operand(fc, value, target_state)?;
                let kept = self.keep_value(fc, keep)?;
                self.emit_with_u8(Opcode::StoreElem, kind as u8);
                self.restore_kept(fc, kept);
                if temps.is_some() {
                    fc.free_temp();
                    fc.free_temp();
                }
            }
            _ => return Err(self.unlowerable("assignment target", target)),
        }
        Ok(())
    }

    /// Compile the assigned value with `CompoundOperand` bound to the target
    fn compile_operand(
        &mut self,
        fc: &mut FunctionContext,
        value: &Expr,
        target: Option<CompoundTarget>,
    ) -> CompileResult<()> {
        let saved = fc.compound;
        if target.is_some() {
            fc.compound = target;
        }
        let result = self.compile_expr(fc, value);
        fc.compound = saved;
        result
    }

    /// Stash a copy of the value about to be stored
    fn keep_value(&mut self, fc: &mut FunctionContext, keep: bool) -> CompileResult<Option<u16>> {
        if !keep {
            return Ok(None);
        }
        let temp = fc.alloc_temp()?;
        self.emit(Opcode::Dup);
        self.emit_with_u16(Opcode::StoreLocal, temp);
        Ok(Some(temp))
    }

    fn restore_kept(&mut self, fc: &mut FunctionContext, kept: Option<u16>) {
        if let Some(temp) = kept {
            self.emit_with_u16(Opcode::LoadLocal, temp);
            fc.free_temp();
        }
    }

    // ========================================================================
    // Coercions
    // ========================================================================

    /// Convert the value on the stack, already produced from `coercion.source`
    fn compile_coercion(&mut self, fc: &mut FunctionContext, expr: &Expr, coercion: &Coercion) -> CompileResult<()> {
        let source = self.ty(fc, coercion.source.ty);
        let target = self.ty(fc, expr.ty);
        match &coercion.kind {
            CoercionKind::Identity => {}
            CoercionKind::IntToFloat => {
                let signed = self.ctx.int(source).map_or(true, |i| i.signed);
                let single = self.ctx.float(target).is_some_and(|f| f.width == 32);
                self.emit(match (signed, single) {
                    (true, false) => Opcode::IntToF64,
                    (false, false) => Opcode::UIntToF64,
                    (true, true) => Opcode::IntToF32,
                    (false, true) => Opcode::UIntToF32,
                });
            }
            CoercionKind::IntToString => {
                let signed = self.ctx.int(source).map_or(true, |i| i.signed);
                self.emit(if signed { Opcode::IntToStr } else { Opcode::UIntToStr });
            }
            CoercionKind::UnionWrap { tag } => {
                let layout = self.layouts.layout_of(&*self.ctx, target)?;
                self.emit(Opcode::MakeUnion);
                self.code.emit_u32(layout);
                self.code.emit_u32(*tag);
            }
            CoercionKind::UnionNarrow { .. } => {
                let kind = slot_kind(&*self.ctx, target)?;
                self.emit_with_u8(Opcode::UnionPayload, kind as u8);
            }
            CoercionKind::ToInterface(implementation) => {
                self.compile_to_interface(fc, source, target, implementation)?;
            }
        }
        Ok(())
    }
}
