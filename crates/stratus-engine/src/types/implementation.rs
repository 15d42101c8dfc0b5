//! Structural interface implementations
//!
//! A class implements an interface when it has a compatible method for
//! every interface method and a compatible field for every interface
//! field. Nothing is declared; the binding is discovered on demand and
//! cached per (class, interface) pair.

use super::context::TypeContext;
use super::ty::TypeId;
use crate::ast::FunctionId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Proof that a class satisfies an interface, with the slot assignments
#[derive(Debug, Clone, PartialEq)]
pub struct Implementation {
    pub interface: TypeId,
    pub class: TypeId,
    pub method_bindings: Vec<MethodBinding>,
    pub field_bindings: Vec<FieldBinding>,
}

/// Interface method slot bound to a class method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBinding {
    pub slot: u32,
    pub function: FunctionId,
}

/// Interface field slot bound to a class field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBinding {
    pub slot: u32,
    /// Index into the class's fields
    pub field: u32,
}

/// An interface member the class has no compatible counterpart for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMember {
    pub name: String,
    /// Rendered signature, e.g. `area() -> i64` or `side: i64`
    pub signature: String,
}

pub type ImplementationResult = Result<Arc<Implementation>, Vec<MissingMember>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct ImplementationCache {
    resolved: FxHashMap<(TypeId, TypeId), ImplementationResult>,
    /// Pairs currently being searched; assumed to hold while in progress
    in_progress: FxHashSet<(TypeId, TypeId)>,
}

impl TypeContext {
    /// Find or compute how `class` implements `interface`
    ///
    /// On failure returns every interface member the class lacks.
    pub fn get_or_create_implementation(&mut self, class: TypeId, interface: TypeId) -> ImplementationResult {
        let class = self.unalias(class);
        let interface = self.unalias(interface);
        let key = (class, interface);

        if let Some(result) = self.implementations.resolved.get(&key) {
            return result.clone();
        }
        if self.implementations.in_progress.contains(&key) {
            // Recursive requirement; the outer search decides
            return Ok(Arc::new(Implementation {
                interface,
                class,
                method_bindings: Vec::new(),
                field_bindings: Vec::new(),
            }));
        }

        self.implementations.in_progress.insert(key);
        let result = self.search_implementation(class, interface);
        self.implementations.in_progress.remove(&key);
        self.implementations.resolved.insert(key, result.clone());
        result
    }

    /// Cached implementation, if one exists
    pub fn implementation(&mut self, class: TypeId, interface: TypeId) -> Option<Arc<Implementation>> {
        self.get_or_create_implementation(class, interface).ok()
    }

    fn search_implementation(&mut self, class: TypeId, interface: TypeId) -> ImplementationResult {
        let (iface_methods, iface_fields) = match self.interface(interface) {
            Some(i) => (i.methods.clone(), i.fields.clone()),
            None => return Err(Vec::new()),
        };
        let (class_methods, class_fields) = match self.class(class) {
            Some(c) => (c.methods.clone(), c.fields.clone()),
            None => return Err(Vec::new()),
        };

        let mut missing = Vec::new();
        let mut method_bindings = Vec::new();
        for (slot, wanted) in iface_methods.iter().enumerate() {
            let found = class_methods
                .iter()
                .filter(|m| m.name == wanted.name)
                .find(|m| self.is_callable_as(m.signature, wanted.signature));
            match found {
                Some(method) => method_bindings.push(MethodBinding {
                    slot: slot as u32,
                    function: method.function,
                }),
                None => missing.push(MissingMember {
                    name: wanted.name.clone(),
                    signature: self.display_signature(&wanted.name, wanted.signature),
                }),
            }
        }

        let mut field_bindings = Vec::new();
        for (slot, wanted) in iface_fields.iter().enumerate() {
            let found = class_fields
                .iter()
                .position(|f| f.name == wanted.name && self.binds_without_conversion(wanted.ty, f.ty));
            match found {
                Some(index) => field_bindings.push(FieldBinding {
                    slot: slot as u32,
                    field: index as u32,
                }),
                None => missing.push(MissingMember {
                    name: wanted.name.clone(),
                    signature: format!("{}: {}", wanted.name, self.display(wanted.ty)),
                }),
            }
        }

        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(Arc::new(Implementation {
            interface,
            class,
            method_bindings,
            field_bindings,
        }))
    }

    /// Whether a method with signature `actual` can stand in for `wanted`
    ///
    /// Same arity; the class method accepts at least what the interface
    /// passes, and its result fits the interface's return type.
    fn is_callable_as(&mut self, actual: TypeId, wanted: TypeId) -> bool {
        let (actual, wanted) = match (self.function(actual), self.function(wanted)) {
            (Some(a), Some(w)) => (a.clone(), w.clone()),
            _ => return false,
        };
        if actual.params.len() != wanted.params.len() {
            return false;
        }
        let params_ok = actual
            .params
            .iter()
            .zip(&wanted.params)
            .all(|(a, w)| self.binds_without_conversion(*a, *w));
        params_ok && self.binds_without_conversion(wanted.return_type, actual.return_type)
    }

    /// Assignable, and the value needs no conversion at the call boundary
    ///
    /// Interface dispatch passes values straight through, so a binding that
    /// would need a coercion thunk is rejected.
    fn binds_without_conversion(&mut self, to: TypeId, from: TypeId) -> bool {
        self.is_assignable_from(to, from) && !self.needs_conversion(to, from)
    }
}
