//! Bytecode generation from the checked syntax tree
//!
//! Code is emitted in two phases:
//! 1. every free function and every method of a non-generic class is
//!    compiled in declaration order, recording a [`Fixup`] for each call to
//!    a body that has no address yet
//! 2. the fixup list is drained as a worklist, compiling missing bodies on
//!    demand (this is where generic instances get specialized), then every
//!    placeholder is patched in one pass
//!
//! The worklist grows while it is drained and never recurses, so call-graph
//! depth does not affect the compiler's stack.

mod call;
mod expr;
pub mod fixup;
mod fold;
mod function;
mod stmt;

use self::fixup::{FnKey, Fixup, PatchSite};
use self::function::FunctionContext;
use super::bytecode::{BytecodeWriter, Chunk, Constant, ConstantPool, ForeignFunction, FunctionInfo, Opcode};
use super::error::{CompileError, CompileResult};
use super::layout::{slot_kind, LayoutCache, SlotKind};
use crate::ast::{FunctionId, FunctionKind, Module};
use crate::checker::Declarations;
use crate::types::{Type, TypeContext, TypeId};
use rustc_hash::FxHashMap;

/// Compiles a checked module into a [`Chunk`]
pub struct Compiler<'a> {
    pub(super) ctx: &'a mut TypeContext,
    pub(super) module: &'a Module,
    pub(super) decls: &'a Declarations,
    pub(super) code: BytecodeWriter,
    pub(super) constants: ConstantPool,
    pub(super) layouts: LayoutCache,
    /// Entry address of every body emitted so far
    compiled: FxHashMap<FnKey, u64>,
    fixups: Vec<Fixup>,
    functions: Vec<FunctionInfo>,
    foreign: Vec<ForeignFunction>,
}

impl<'a> Compiler<'a> {
    pub fn new(ctx: &'a mut TypeContext, module: &'a Module, decls: &'a Declarations) -> Self {
        Self {
            ctx,
            module,
            decls,
            code: BytecodeWriter::new(),
            constants: ConstantPool::new(),
            layouts: LayoutCache::new(),
            compiled: FxHashMap::default(),
            fixups: Vec::new(),
            functions: Vec::new(),
            foreign: Vec::new(),
        }
    }

    pub fn compile(mut self) -> CompileResult<Chunk> {
        let main = self.entry_point()?;
        self.foreign = self.foreign_table()?;

        // Phase 1: everything that needs no specialization
        let module = self.module;
        for (index, function) in module.functions.iter().enumerate() {
            let id = FunctionId(index as u32);
            let generic_owner = function
                .kind
                .owner()
                .is_some_and(|class| module.class(class).is_generic());
            if !generic_owner {
                self.compile_function(FnKey::plain(id))?;
            }
        }

        // Phase 2: drain the worklist, then patch
        let mut next = 0;
        while next < self.fixups.len() {
            let target = self.fixups[next].target;
            if !self.compiled.contains_key(&target) {
                self.compile_function(target)?;
            }
            next += 1;
        }
        log::debug!(
            "patching {} fixups across {} bodies",
            self.fixups.len(),
            self.compiled.len()
        );
        for fixup in std::mem::take(&mut self.fixups) {
            let address = self.address_of(fixup.target)?;
            match fixup.site {
                PatchSite::Immediate(offset) => self.code.patch_u64(offset, address),
                PatchSite::Constant(index) => self.constants.set(index, Constant::U64(address)),
            }
        }

        let main = self.address_of(FnKey::plain(main))?;
        self.functions.sort_by_key(|f| f.address);
        Ok(Chunk {
            constants: self.constants,
            code: self.code.into_bytes(),
            functions: self.functions,
            layouts: self.layouts.into_layouts(),
            foreign_functions: self.foreign,
            main,
        })
    }

    fn address_of(&self, key: FnKey) -> CompileResult<u64> {
        self.compiled.get(&key).copied().ok_or_else(|| CompileError::Unlowerable {
            what: format!("reference to '{}'", self.module.function(key.function).name),
            span: self.module.function(key.function).span,
        })
    }

    /// Find `main` and check its signature
    fn entry_point(&self) -> CompileResult<FunctionId> {
        let main = self.module.main_function().ok_or(CompileError::MissingMain)?;
        let signature = self.decls.signature(main);
        let valid = self.ctx.function(signature).is_some_and(|f| {
            let params_ok = f.params.is_empty() || f.params == [TypeId::STRING_ARRAY];
            let ret = self.ctx.unalias(f.return_type);
            params_ok && (ret == TypeId::VOID || self.ctx.int(ret).is_some())
        });
        if valid {
            Ok(main)
        } else {
            Err(CompileError::InvalidMain {
                signature: self.ctx.display_signature("main", signature),
            })
        }
    }

    fn foreign_table(&self) -> CompileResult<Vec<ForeignFunction>> {
        self.decls
            .foreign
            .iter()
            .zip(&self.module.foreign_functions)
            .map(|(signature, decl)| {
                let f = self.ctx.function(*signature).ok_or_else(|| CompileError::Unlowerable {
                    what: format!("foreign function '{}'", decl.name),
                    span: decl.span,
                })?;
                let params = f
                    .params
                    .iter()
                    .map(|p| slot_kind(&*self.ctx, *p))
                    .collect::<CompileResult<Vec<_>>>()?;
                let ret = match self.ctx.unalias(f.return_type) {
                    TypeId::VOID => None,
                    ret => Some(slot_kind(&*self.ctx, ret)?),
                };
                Ok(ForeignFunction {
                    name: decl.name.clone(),
                    params,
                    ret,
                })
            })
            .collect()
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    pub(super) fn emit(&mut self, opcode: Opcode) {
        self.code.emit_opcode(opcode);
    }

    pub(super) fn emit_with_u32(&mut self, opcode: Opcode, operand: u32) {
        self.code.emit_opcode(opcode);
        self.code.emit_u32(operand);
    }

    pub(super) fn emit_with_u16(&mut self, opcode: Opcode, operand: u16) {
        self.code.emit_opcode(opcode);
        self.code.emit_u16(operand);
    }

    pub(super) fn emit_with_u8(&mut self, opcode: Opcode, operand: u8) {
        self.code.emit_opcode(opcode);
        self.code.emit_u8(operand);
    }

    /// Push an integer with the narrowest opcode that holds it
    pub(super) fn push_int(&mut self, value: i64) {
        if let Ok(v) = i8::try_from(value) {
            self.emit(Opcode::PushI8);
            self.code.emit_i8(v);
        } else if let Ok(v) = i16::try_from(value) {
            self.emit(Opcode::PushI16);
            self.code.emit_i16(v);
        } else if let Ok(v) = i32::try_from(value) {
            self.emit(Opcode::PushI32);
            self.code.emit_i32(v);
        } else {
            self.emit(Opcode::PushI64);
            self.code.emit_i64(value);
        }
    }

    /// Push a float; single precision values round to f32 first
    pub(super) fn push_float(&mut self, value: f64, single: bool) {
        let narrow = value as f32;
        if single || f64::from(narrow) == value {
            self.emit(Opcode::PushF32);
            self.code.emit_f32(narrow);
        } else {
            self.emit(Opcode::PushF64);
            self.code.emit_f64(value);
        }
    }

    pub(super) fn push_bool(&mut self, value: bool) {
        self.emit(if value { Opcode::PushTrue } else { Opcode::PushFalse });
    }

    /// Emit a forward jump; returns the constant slot to bind later
    pub(super) fn emit_jump(&mut self, opcode: Opcode) -> u32 {
        let slot = self.constants.placeholder();
        self.emit_with_u32(opcode, slot);
        slot
    }

    /// Point a jump slot at the current position
    pub(super) fn bind(&mut self, slot: u32) {
        let here = self.code.position() as u64;
        self.constants.set(slot, Constant::U64(here));
    }

    /// Jump back to an already emitted position
    pub(super) fn emit_loop(&mut self, target: usize) {
        let slot = self.constants.placeholder();
        self.constants.set(slot, Constant::U64(target as u64));
        self.emit_with_u32(Opcode::Jump, slot);
    }

    /// Direct call to a body, patched later if it has no address yet
    pub(super) fn emit_call(&mut self, target: FnKey, argc: usize) -> CompileResult<()> {
        let argc = u8::try_from(argc).map_err(|_| CompileError::Unlowerable {
            what: format!("call with {} arguments", argc),
            span: self.module.function(target.function).span,
        })?;
        self.emit(Opcode::Call);
        let site = self.code.position();
        match self.compiled.get(&target) {
            Some(&address) => self.code.emit_u64(address),
            None => {
                self.code.emit_u64(0);
                self.fixups.push(Fixup {
                    site: PatchSite::Immediate(site),
                    target,
                });
            }
        }
        self.code.emit_u8(argc);
        Ok(())
    }

    /// Constant slot holding a body's address, for function values and interface slots
    pub(super) fn address_constant(&mut self, target: FnKey) -> u32 {
        let slot = self.constants.placeholder();
        match self.compiled.get(&target) {
            Some(&address) => self.constants.set(slot, Constant::U64(address)),
            None => self.fixups.push(Fixup {
                site: PatchSite::Constant(slot),
                target,
            }),
        }
        slot
    }

    pub(super) fn emit_load(&mut self, kind: SlotKind, offset: u32) {
        let opcode = match kind {
            SlotKind::I8 => Opcode::LoadI8,
            SlotKind::I16 => Opcode::LoadI16,
            SlotKind::I32 => Opcode::LoadI32,
            SlotKind::I64 | SlotKind::U64 => Opcode::LoadI64,
            SlotKind::U8 => Opcode::LoadU8,
            SlotKind::U16 => Opcode::LoadU16,
            SlotKind::U32 => Opcode::LoadU32,
            SlotKind::F32 => Opcode::LoadF32,
            SlotKind::F64 => Opcode::LoadF64,
            SlotKind::Bool => Opcode::LoadBool,
            SlotKind::Ref | SlotKind::Null => Opcode::LoadRef,
        };
        self.emit_with_u32(opcode, offset);
    }

    pub(super) fn emit_store(&mut self, kind: SlotKind, offset: u32) {
        let opcode = match kind {
            SlotKind::I8 | SlotKind::U8 => Opcode::Store8,
            SlotKind::I16 | SlotKind::U16 => Opcode::Store16,
            SlotKind::I32 | SlotKind::U32 => Opcode::Store32,
            SlotKind::I64 | SlotKind::U64 => Opcode::Store64,
            SlotKind::F32 => Opcode::StoreF32,
            SlotKind::F64 => Opcode::StoreF64,
            SlotKind::Bool => Opcode::StoreBool,
            SlotKind::Ref | SlotKind::Null => Opcode::StoreRef,
        };
        self.emit_with_u32(opcode, offset);
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Type of a value inside the body being compiled
    fn ty(&mut self, fc: &FunctionContext, ty: TypeId) -> TypeId {
        let ty = match &fc.substitution {
            Some((params, args)) => self.ctx.substitute(ty, params, args),
            None => ty,
        };
        self.ctx.unalias(ty)
    }

    pub(super) fn is_void(&self, ty: TypeId) -> bool {
        self.ctx.unalias(ty) == TypeId::VOID
    }

    /// Key of a method or constructor called on a receiver of type `receiver`
    pub(super) fn method_key(&self, function: FunctionId, receiver: TypeId) -> FnKey {
        let receiver = self.ctx.unalias(receiver);
        let reified = matches!(self.ctx.get(receiver), Type::Class(c) if c.generic_base.is_some());
        FnKey {
            function,
            receiver: reified.then_some(receiver),
        }
    }

    pub(super) fn function_kind(&self, function: FunctionId) -> FunctionKind {
        self.module.function(function).kind
    }
}
