//! Function bodies and local slots

use super::fixup::FnKey;
use super::Compiler;
use crate::ast::{FunctionKind, LocalId};
use crate::compiler::bytecode::{FunctionInfo, Opcode};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::layout::SlotKind;
use crate::types::TypeId;

/// Target of a compound assignment, readable by `CompoundOperand`
#[derive(Debug, Clone, Copy)]
pub(super) enum CompoundTarget {
    Local(u16),
    /// Object held in a temp slot
    Field { object: u16, offset: u32, kind: SlotKind },
    /// Array and index held in temp slots
    Element { array: u16, index: u16, kind: SlotKind },
}

/// State of the body being emitted
pub(super) struct FunctionContext {
    pub name: String,
    /// Slot of the first declared local: 1 when slot 0 holds the receiver
    base: u16,
    locals: u16,
    temps: u16,
    max_slots: u16,
    /// Generic parameters and the arguments they stand for in this body
    pub substitution: Option<(Vec<TypeId>, Vec<TypeId>)>,
    pub compound: Option<CompoundTarget>,
}

impl FunctionContext {
    fn new(name: String, has_receiver: bool, locals: usize) -> CompileResult<Self> {
        let base = u16::from(has_receiver);
        let locals = u16::try_from(locals)
            .ok()
            .filter(|n| n.checked_add(base).is_some())
            .ok_or_else(|| CompileError::TooManyLocals { name: name.clone() })?;
        Ok(Self {
            name,
            base,
            locals,
            temps: 0,
            max_slots: base + locals,
            substitution: None,
            compound: None,
        })
    }

    pub fn local_slot(&self, local: LocalId) -> u16 {
        self.base + local.0 as u16
    }

    /// Reserve a scratch slot; temps are released in reverse order
    pub fn alloc_temp(&mut self) -> CompileResult<u16> {
        let slot = (self.base + self.locals)
            .checked_add(self.temps)
            .ok_or_else(|| CompileError::TooManyLocals { name: self.name.clone() })?;
        self.temps += 1;
        self.max_slots = self.max_slots.max(slot.saturating_add(1));
        Ok(slot)
    }

    pub fn free_temp(&mut self) {
        self.temps = self.temps.saturating_sub(1);
    }
}

impl Compiler<'_> {
    /// Emit one body and record its entry address
    pub(super) fn compile_function(&mut self, key: FnKey) -> CompileResult<u64> {
        let module = self.module;
        let decl = module.function(key.function);
        let address = self.code.position() as u64;
        // Recorded first so recursive calls bind directly
        self.compiled.insert(key, address);

        let owner = decl.kind.owner().map(|class| key.receiver.unwrap_or(self.decls.class(class)));
        let name = match owner {
            Some(owner) => format!("{}.{}", self.ctx.display(owner), decl.name),
            None => decl.name.clone(),
        };
        log::debug!("compiling {} at {}", name, address);

        let mut fc = FunctionContext::new(name, owner.is_some(), decl.locals.len())?;
        if let Some(instance) = key.receiver {
            let base = self.ctx.class(instance).and_then(|c| c.generic_base.map(|b| (b, c.generic_args.clone())));
            if let Some((base, args)) = base {
                let params = self.ctx.class(base).map(|c| c.generic_params.clone()).unwrap_or_default();
                fc.substitution = Some((params, args));
            }
        }

        self.emit(Opcode::Frame);
        let frame_operand = self.code.position();
        self.code.emit_u16(0);

        self.compile_block(&mut fc, &decl.body)?;

        let returns_void = match decl.kind {
            FunctionKind::Constructor(_) => true,
            _ => {
                let signature = self.decls.signature(key.function);
                let ret = self.ctx.function(signature).map_or(TypeId::VOID, |f| f.return_type);
                self.is_void(ret)
            }
        };
        if returns_void {
            self.emit(Opcode::ReturnVoid);
        }
        self.code.patch_u16(frame_operand, fc.max_slots);

        let mut locals = Vec::with_capacity(fc.max_slots as usize);
        if owner.is_some() {
            locals.push("this".to_string());
        }
        locals.extend(decl.locals.iter().map(|l| l.name.clone()));
        self.functions.push(FunctionInfo {
            address,
            name: fc.name,
            locals,
        });
        Ok(address)
    }
}
