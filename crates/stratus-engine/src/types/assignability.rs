//! Assignability checking
//!
//! `is_assignable_from(to, from)` is the single predicate the checker and
//! the implementation search use to decide whether a value of type `from`
//! may flow into a slot of type `to`.

use super::context::TypeContext;
use super::ty::{Type, TypeId};

impl TypeContext {
    /// Check if a value of type `from` can be assigned to a slot of type `to`
    pub fn is_assignable_from(&mut self, to: TypeId, from: TypeId) -> bool {
        let to = self.unalias(to);
        let from = self.unalias(from);

        // Reflexive
        if to == from {
            return true;
        }

        match (self.get(to).clone(), self.get(from).clone()) {
            (_, Type::Invalid) | (Type::Invalid, _) => false,

            (Type::Pointer, Type::Void) => false,
            (Type::Pointer, _) => true,

            // Widening only
            (Type::Int(t), Type::Int(f)) => {
                (t.signed == f.signed && t.width >= f.width) || (t.signed && !f.signed && t.width > f.width)
            }

            (Type::Float(t), Type::Float(f)) => t.width >= f.width,
            (Type::Float(_), Type::Int(_)) => true,

            (Type::Union(u), _) => u
                .members
                .iter()
                .any(|member| self.is_assignable_from(*member, from)),

            // Arrays are invariant; distinct element types never intern to the same id
            (Type::Array(_), Type::Array(_)) => false,

            (Type::Interface(_), Type::Class(_)) => self.get_or_create_implementation(from, to).is_ok(),

            _ => false,
        }
    }

    /// Whether a coercion from `from` to `to` changes the runtime value
    ///
    /// Widening between ints, between floats, and anything into a pointer
    /// keeps the value as is. Int-to-float, union boxing and interface
    /// wrapping do not.
    pub fn needs_conversion(&self, to: TypeId, from: TypeId) -> bool {
        let to = self.unalias(to);
        let from = self.unalias(from);
        if to == from {
            return false;
        }
        !matches!(
            (self.get(to), self.get(from)),
            (Type::Int(_), Type::Int(_)) | (Type::Float(_), Type::Float(_)) | (Type::Pointer, _)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AliasId, ClassId, FunctionId, InterfaceId};
    use crate::types::{Field, InterfaceMethod, Method};

    const INTS: [TypeId; 8] = [
        TypeId::I8,
        TypeId::I16,
        TypeId::I32,
        TypeId::I64,
        TypeId::U8,
        TypeId::U16,
        TypeId::U32,
        TypeId::U64,
    ];

    #[test]
    fn test_reflexive_for_every_int() {
        let mut ctx = TypeContext::new();
        for t in INTS {
            assert!(ctx.is_assignable_from(t, t), "{} should accept itself", ctx.display(t));
        }
    }

    #[test]
    fn test_int_widening_only() {
        let mut ctx = TypeContext::new();
        assert!(ctx.is_assignable_from(TypeId::I64, TypeId::I8));
        assert!(!ctx.is_assignable_from(TypeId::I8, TypeId::I64));
        assert!(ctx.is_assignable_from(TypeId::U32, TypeId::U16));
        assert!(!ctx.is_assignable_from(TypeId::U16, TypeId::U32));
    }

    #[test]
    fn test_mixed_signedness() {
        let mut ctx = TypeContext::new();
        // Signed target must be strictly wider than an unsigned source
        assert!(ctx.is_assignable_from(TypeId::I16, TypeId::U8));
        assert!(!ctx.is_assignable_from(TypeId::I8, TypeId::U8));
        assert!(ctx.is_assignable_from(TypeId::I64, TypeId::U32));
        assert!(!ctx.is_assignable_from(TypeId::I64, TypeId::U64));
        // Never unsigned from signed
        assert!(!ctx.is_assignable_from(TypeId::U64, TypeId::I8));
    }

    #[test]
    fn test_float_accepts_floats_and_ints() {
        let mut ctx = TypeContext::new();
        assert!(ctx.is_assignable_from(TypeId::F64, TypeId::F32));
        assert!(!ctx.is_assignable_from(TypeId::F32, TypeId::F64));
        assert!(ctx.is_assignable_from(TypeId::F32, TypeId::I64));
        assert!(!ctx.is_assignable_from(TypeId::I64, TypeId::F32));
    }

    #[test]
    fn test_pointer_accepts_anything_but_void_and_invalid() {
        let mut ctx = TypeContext::new();
        assert!(ctx.is_assignable_from(TypeId::POINTER, TypeId::I64));
        assert!(ctx.is_assignable_from(TypeId::POINTER, TypeId::STRING));
        assert!(!ctx.is_assignable_from(TypeId::POINTER, TypeId::VOID));
        assert!(!ctx.is_assignable_from(TypeId::POINTER, TypeId::INVALID));
    }

    #[test]
    fn test_union_accepts_members() {
        let mut ctx = TypeContext::new();
        let a = ctx.declare_class(ClassId(0), "A", &[]);
        let b = ctx.declare_class(ClassId(1), "B", &[]);
        let ab = ctx.union_type(vec![a, b]);
        assert!(ctx.is_assignable_from(ab, a));
        assert!(ctx.is_assignable_from(ab, b));
        assert!(!ctx.is_assignable_from(a, ab));

        // Members accept through widening too
        let n = ctx.union_type(vec![TypeId::I64, TypeId::NULL]);
        assert!(ctx.is_assignable_from(n, TypeId::I8));
        assert!(ctx.is_assignable_from(n, TypeId::NULL));
        assert!(!ctx.is_assignable_from(n, TypeId::BOOL));
    }

    #[test]
    fn test_arrays_are_invariant() {
        let mut ctx = TypeContext::new();
        let small = ctx.array_type(TypeId::I8);
        let big = ctx.array_type(TypeId::I64);
        assert!(!ctx.is_assignable_from(big, small));
        let again = ctx.array_type(TypeId::I8);
        assert!(ctx.is_assignable_from(again, small));
    }

    #[test]
    fn test_aliases_are_transparent() {
        let mut ctx = TypeContext::new();
        let alias = ctx.declare_alias(AliasId(0), "Byte");
        ctx.define_alias(alias, TypeId::U8);
        assert!(ctx.is_assignable_from(TypeId::U16, alias));
        assert!(ctx.is_assignable_from(alias, TypeId::U8));
        assert!(!ctx.is_assignable_from(alias, TypeId::U16));
    }

    #[test]
    fn test_interface_accepts_structural_class() {
        let mut ctx = TypeContext::new();
        let shape = ctx.declare_interface(InterfaceId(0), "Shape");
        let area = ctx.function_type(vec![], TypeId::I64);
        ctx.define_interface(
            shape,
            vec![InterfaceMethod {
                name: "area".into(),
                signature: area,
            }],
            vec![],
        );

        let square = ctx.declare_class(ClassId(0), "Square", &[]);
        ctx.define_class(
            square,
            vec![Field {
                name: "side".into(),
                ty: TypeId::I64,
            }],
            vec![Method {
                name: "area".into(),
                function: FunctionId(0),
                signature: area,
            }],
            vec![],
        );
        let rock = ctx.declare_class(ClassId(1), "Rock", &[]);

        assert!(ctx.is_assignable_from(shape, square));
        assert!(!ctx.is_assignable_from(shape, rock));
        assert!(!ctx.is_assignable_from(square, shape));
    }

    #[test]
    fn test_needs_conversion() {
        let mut ctx = TypeContext::new();
        let u = ctx.union_type(vec![TypeId::I64, TypeId::NULL]);
        assert!(!ctx.needs_conversion(TypeId::I64, TypeId::I8));
        assert!(ctx.needs_conversion(TypeId::F64, TypeId::I64));
        assert!(ctx.needs_conversion(u, TypeId::I64));
        assert!(!ctx.needs_conversion(TypeId::POINTER, TypeId::STRING));
    }
}
