//! Type context for managing types and type interning

use super::implementation::ImplementationCache;
use super::ty::*;
use crate::ast::{AliasId, ClassId, EnumId, InterfaceId};
use rustc_hash::FxHashMap;

/// Type context that owns every type of a compilation session
///
/// Interning guarantees that identical types share a `TypeId`, so identity
/// comparison is type equality. The context is created per session and
/// passed explicitly to the checker and the compiler.
#[derive(Debug, Clone)]
pub struct TypeContext {
    /// Storage for all types, indexed by TypeId
    types: Vec<Type>,

    /// Reverse mapping from interning key to TypeId
    interned: FxHashMap<TypeKey, TypeId>,

    /// Interface implementations discovered so far
    pub(super) implementations: ImplementationCache,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    /// Create a context with the primitive types pre-interned
    pub fn new() -> Self {
        let mut ctx = TypeContext {
            types: Vec::new(),
            interned: FxHashMap::default(),
            implementations: ImplementationCache::default(),
        };

        // Order must match the TypeId constants
        ctx.intern(Type::Invalid);
        ctx.intern(Type::Void);
        ctx.intern(Type::Null);
        ctx.intern(Type::Bool);
        for signed in [true, false] {
            for width in [8, 16, 32, 64] {
                ctx.intern(Type::Int(IntType { signed, width }));
            }
        }
        ctx.intern(Type::Float(FloatType { width: 32 }));
        ctx.intern(Type::Float(FloatType { width: 64 }));
        ctx.intern(Type::Pointer);
        ctx.intern(Type::TypeOfTypes);
        ctx.intern(Type::Class(ClassType {
            decl: None,
            name: "string".to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            generic_params: Vec::new(),
            generic_args: Vec::new(),
            generic_base: None,
            reified_instances: FxHashMap::default(),
        }));
        ctx.array_type(TypeId::STRING);
        ctx
    }

    /// Intern a type, returning its TypeId
    ///
    /// If a type with the same key already exists, returns the existing TypeId.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        let key = TypeKey::of(&ty);
        if let Some(&id) = self.interned.get(&key) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        self.interned.insert(key, id);
        id
    }

    /// Get a type by its ID
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.index()]
    }

    /// Number of interned types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn int_type(&mut self, signed: bool, width: u8) -> TypeId {
        self.intern(Type::Int(IntType { signed, width }))
    }

    pub fn float_type(&mut self, width: u8) -> TypeId {
        self.intern(Type::Float(FloatType { width }))
    }

    pub fn array_type(&mut self, element: TypeId) -> TypeId {
        self.intern(Type::Array(ArrayType { element }))
    }

    pub fn function_type(&mut self, params: Vec<TypeId>, return_type: TypeId) -> TypeId {
        self.intern(Type::Function(FunctionType { params, return_type }))
    }

    /// Create a union type
    ///
    /// Nested unions are flattened, aliases unwrapped, and members
    /// deduplicated and sorted so member order never affects identity.
    /// A single remaining member is returned as is.
    pub fn union_type(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::with_capacity(members.len());
        for member in members {
            let member = self.unalias(member);
            match self.get(member) {
                Type::Union(u) => flat.extend(u.members.iter().copied()),
                Type::Invalid => return TypeId::INVALID,
                _ => flat.push(member),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => TypeId::INVALID,
            1 => flat[0],
            _ => self.intern(Type::Union(UnionType { members: flat })),
        }
    }

    // ========================================================================
    // Nominal declarations
    // ========================================================================

    /// Intern a declared class with no members yet
    ///
    /// Members are attached with [`TypeContext::define_class`] once every
    /// nominal type has an id, which lets classes refer to each other.
    pub fn declare_class(&mut self, decl: ClassId, name: &str, generic_params: &[String]) -> TypeId {
        let params = generic_params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                self.intern(Type::TypeParam(TypeParamType {
                    owner: decl,
                    index: i as u32,
                    name: param.clone(),
                }))
            })
            .collect();
        self.intern(Type::Class(ClassType {
            decl: Some(decl),
            name: name.to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            generic_params: params,
            generic_args: Vec::new(),
            generic_base: None,
            reified_instances: FxHashMap::default(),
        }))
    }

    /// Attach members to a declared class and refresh its reified instances
    pub fn define_class(&mut self, class: TypeId, fields: Vec<Field>, methods: Vec<Method>, constructors: Vec<Method>) {
        let instances: Vec<TypeId> = match self.get_mut(class) {
            Type::Class(c) => {
                c.fields = fields;
                c.methods = methods;
                c.constructors = constructors;
                c.reified_instances.values().copied().collect()
            }
            _ => return,
        };
        for instance in instances {
            self.populate_instance(class, instance);
        }
    }

    pub fn declare_interface(&mut self, decl: InterfaceId, name: &str) -> TypeId {
        self.intern(Type::Interface(InterfaceType {
            decl,
            name: name.to_string(),
            methods: Vec::new(),
            fields: Vec::new(),
        }))
    }

    pub fn define_interface(&mut self, iface: TypeId, methods: Vec<InterfaceMethod>, fields: Vec<Field>) {
        if let Type::Interface(i) = self.get_mut(iface) {
            i.methods = methods;
            i.fields = fields;
        }
    }

    pub fn enum_type(&mut self, decl: EnumId, name: &str, elements: Vec<String>) -> TypeId {
        self.intern(Type::Enum(EnumType {
            decl,
            name: name.to_string(),
            elements,
        }))
    }

    /// Intern an alias whose target is filled in by [`TypeContext::define_alias`]
    pub fn declare_alias(&mut self, decl: AliasId, name: &str) -> TypeId {
        self.intern(Type::Alias(AliasType {
            decl,
            name: name.to_string(),
            aliased: TypeId::INVALID,
        }))
    }

    pub fn define_alias(&mut self, alias: TypeId, aliased: TypeId) {
        // An alias of itself would make unalias loop forever
        if self.unalias(aliased) == alias {
            return;
        }
        if let Type::Alias(a) = self.get_mut(alias) {
            a.aliased = aliased;
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Follow aliases to the underlying type
    pub fn unalias(&self, mut id: TypeId) -> TypeId {
        let mut hops = 0;
        while let Type::Alias(a) = self.get(id) {
            if a.aliased == id || hops > self.types.len() {
                return TypeId::INVALID;
            }
            id = a.aliased;
            hops += 1;
        }
        id
    }

    pub fn resolved(&self, id: TypeId) -> &Type {
        self.get(self.unalias(id))
    }

    pub fn class(&self, id: TypeId) -> Option<&ClassType> {
        match self.resolved(id) {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn interface(&self, id: TypeId) -> Option<&InterfaceType> {
        match self.resolved(id) {
            Type::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn union(&self, id: TypeId) -> Option<&UnionType> {
        match self.resolved(id) {
            Type::Union(u) => Some(u),
            _ => None,
        }
    }

    pub fn function(&self, id: TypeId) -> Option<&FunctionType> {
        match self.resolved(id) {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn array_element(&self, id: TypeId) -> Option<TypeId> {
        match self.resolved(id) {
            Type::Array(a) => Some(a.element),
            _ => None,
        }
    }

    pub fn int(&self, id: TypeId) -> Option<IntType> {
        match self.resolved(id) {
            Type::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn float(&self, id: TypeId) -> Option<FloatType> {
        match self.resolved(id) {
            Type::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_invalid(&self, id: TypeId) -> bool {
        matches!(self.resolved(id), Type::Invalid)
    }

    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.resolved(id).is_scalar()
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        self.unalias(id) == TypeId::STRING
    }

    /// Whether values of this type live on the heap
    pub fn is_reference(&self, id: TypeId) -> bool {
        matches!(
            self.resolved(id),
            Type::Class(_) | Type::Interface(_) | Type::Union(_) | Type::Array(_)
        )
    }

    /// Tag of `member` within `union`, looking through aliases
    pub fn union_tag(&self, union: TypeId, member: TypeId) -> Option<u32> {
        let member = self.unalias(member);
        self.union(union).and_then(|u| u.tag_of(member))
    }

    // ========================================================================
    // Generics
    // ========================================================================

    /// Reify a generic class with concrete type arguments
    ///
    /// The instance is named `Base<Arg1,Arg2>` and memoized per exact
    /// argument tuple. Passing the class's own parameters returns the
    /// generic class itself. Returns `None` on an arity mismatch.
    pub fn reify(&mut self, generic: TypeId, args: &[TypeId]) -> Option<TypeId> {
        let (decl, name, params, memo) = match self.class(generic) {
            Some(c) if c.generic_params.len() == args.len() && c.generic_base.is_none() => (
                c.decl?,
                c.name.clone(),
                c.generic_params.clone(),
                c.reified_instances.get(args).copied(),
            ),
            _ => return None,
        };
        if params.is_empty() || params.as_slice() == args {
            return Some(generic);
        }
        if let Some(instance) = memo {
            return Some(instance);
        }

        let rendered: Vec<String> = args.iter().map(|a| self.display(*a)).collect();
        let instance = self.intern(Type::Class(ClassType {
            decl: Some(decl),
            name: format!("{}<{}>", name, rendered.join(",")),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            generic_params: Vec::new(),
            generic_args: args.to_vec(),
            generic_base: Some(generic),
            reified_instances: FxHashMap::default(),
        }));
        // Record before populating so self-referential members find the instance
        if let Type::Class(c) = self.get_mut(generic) {
            c.reified_instances.insert(args.to_vec(), instance);
        }
        self.populate_instance(generic, instance);
        Some(instance)
    }

    /// Copy members of `generic` into `instance` with parameters substituted
    fn populate_instance(&mut self, generic: TypeId, instance: TypeId) {
        let (params, fields, methods, constructors) = match self.class(generic) {
            Some(c) => (
                c.generic_params.clone(),
                c.fields.clone(),
                c.methods.clone(),
                c.constructors.clone(),
            ),
            None => return,
        };
        let args = match self.class(instance) {
            Some(c) => c.generic_args.clone(),
            None => return,
        };

        let fields = fields
            .into_iter()
            .map(|f| Field {
                ty: self.substitute(f.ty, &params, &args),
                name: f.name,
            })
            .collect();
        let rebind = |ctx: &mut Self, methods: Vec<Method>| -> Vec<Method> {
            methods
                .into_iter()
                .map(|m| Method {
                    signature: ctx.substitute(m.signature, &params, &args),
                    ..m
                })
                .collect()
        };
        let methods = rebind(self, methods);
        let constructors = rebind(self, constructors);

        if let Type::Class(c) = self.get_mut(instance) {
            c.fields = fields;
            c.methods = methods;
            c.constructors = constructors;
        }
    }

    /// Replace each of `params` with the corresponding entry of `args` inside `ty`
    pub fn substitute(&mut self, ty: TypeId, params: &[TypeId], args: &[TypeId]) -> TypeId {
        if params.is_empty() {
            return ty;
        }
        match self.get(ty).clone() {
            Type::TypeParam(_) => params
                .iter()
                .position(|p| *p == ty)
                .and_then(|i| args.get(i).copied())
                .unwrap_or(ty),
            Type::Array(a) => {
                let element = self.substitute(a.element, params, args);
                self.array_type(element)
            }
            Type::Union(u) => {
                let members = u.members.iter().map(|m| self.substitute(*m, params, args)).collect();
                self.union_type(members)
            }
            Type::Function(f) => {
                let fn_params = f.params.iter().map(|p| self.substitute(*p, params, args)).collect();
                let ret = self.substitute(f.return_type, params, args);
                self.function_type(fn_params, ret)
            }
            Type::Class(c) if c.is_generic() => {
                let own: Vec<TypeId> = c.generic_params.iter().map(|p| self.substitute(*p, params, args)).collect();
                self.reify(ty, &own).unwrap_or(TypeId::INVALID)
            }
            Type::Class(c) => match c.generic_base {
                Some(base) => {
                    let own: Vec<TypeId> = c.generic_args.iter().map(|a| self.substitute(*a, params, args)).collect();
                    self.reify(base, &own).unwrap_or(TypeId::INVALID)
                }
                None => ty,
            },
            _ => ty,
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Human-readable rendering used in diagnostics and reified names
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Invalid => "invalid".to_string(),
            Type::Void => "void".to_string(),
            Type::Null => "null".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Int(i) => i.to_string(),
            Type::Float(f) => format!("f{}", f.width),
            Type::Pointer => "pointer".to_string(),
            Type::TypeOfTypes => "type".to_string(),
            Type::Class(c) => c.name.clone(),
            Type::Interface(i) => i.name.clone(),
            Type::Union(u) => u
                .members
                .iter()
                .map(|m| self.display(*m))
                .collect::<Vec<_>>()
                .join(" | "),
            Type::Array(a) => {
                let element = self.display(a.element);
                if self.union(a.element).is_some() {
                    format!("({})[]", element)
                } else {
                    format!("{}[]", element)
                }
            }
            Type::Function(f) => format!(
                "({}) -> {}",
                f.params.iter().map(|p| self.display(*p)).collect::<Vec<_>>().join(", "),
                self.display(f.return_type)
            ),
            Type::Enum(e) => e.name.clone(),
            Type::Alias(a) => a.name.clone(),
            Type::TypeParam(p) => p.name.clone(),
        }
    }

    /// Render a method signature as `name(params) -> ret`
    pub fn display_signature(&self, name: &str, signature: TypeId) -> String {
        match self.function(signature) {
            Some(f) => format!(
                "{}({}) -> {}",
                name,
                f.params.iter().map(|p| self.display(*p)).collect::<Vec<_>>().join(", "),
                self.display(f.return_type)
            ),
            None => format!("{}: {}", name, self.display(signature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(ctx: &mut TypeContext, n: u32, name: &str) -> TypeId {
        ctx.declare_class(ClassId(n), name, &[])
    }

    #[test]
    fn test_primitive_ids_are_stable() {
        let mut ctx = TypeContext::new();
        assert_eq!(ctx.int_type(true, 64), TypeId::I64);
        assert_eq!(ctx.int_type(false, 8), TypeId::U8);
        assert_eq!(ctx.float_type(32), TypeId::F32);
        assert_eq!(ctx.array_type(TypeId::STRING), TypeId::STRING_ARRAY);
        assert_eq!(ctx.display(TypeId::STRING), "string");
    }

    #[test]
    fn test_structural_interning() {
        let mut ctx = TypeContext::new();
        let a1 = ctx.array_type(TypeId::I32);
        let a2 = ctx.array_type(TypeId::I32);
        assert_eq!(a1, a2);

        let f1 = ctx.function_type(vec![TypeId::I64, TypeId::BOOL], TypeId::VOID);
        let f2 = ctx.function_type(vec![TypeId::I64, TypeId::BOOL], TypeId::VOID);
        let f3 = ctx.function_type(vec![TypeId::BOOL, TypeId::I64], TypeId::VOID);
        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
    }

    #[test]
    fn test_union_order_independent() {
        let mut ctx = TypeContext::new();
        let a = declared(&mut ctx, 0, "A");
        let b = declared(&mut ctx, 1, "B");
        assert_eq!(ctx.union_type(vec![a, b]), ctx.union_type(vec![b, a]));
    }

    #[test]
    fn test_union_flattening_and_dedup() {
        let mut ctx = TypeContext::new();
        let a = declared(&mut ctx, 0, "A");
        let b = declared(&mut ctx, 1, "B");
        let c = declared(&mut ctx, 2, "C");
        let ab = ctx.union_type(vec![a, b]);
        let nested = ctx.union_type(vec![ab, c]);
        let flat = ctx.union_type(vec![a, b, c]);
        assert_eq!(nested, flat);
        assert_eq!(ctx.union_type(vec![a, a, b, a]), ab);
        assert_eq!(ctx.union_type(vec![a, a]), a);
    }

    #[test]
    fn test_union_tags_follow_canonical_order() {
        let mut ctx = TypeContext::new();
        let a = declared(&mut ctx, 0, "A");
        let b = declared(&mut ctx, 1, "B");
        let u = ctx.union_type(vec![b, TypeId::NULL, a]);
        assert_eq!(ctx.union_tag(u, TypeId::NULL), Some(0));
        assert_eq!(ctx.union_tag(u, a), Some(1));
        assert_eq!(ctx.union_tag(u, b), Some(2));
        assert_eq!(ctx.union_tag(u, TypeId::I64), None);
    }

    #[test]
    fn test_union_unwraps_aliases() {
        let mut ctx = TypeContext::new();
        let alias = ctx.declare_alias(AliasId(0), "Count");
        ctx.define_alias(alias, TypeId::I64);
        let u1 = ctx.union_type(vec![alias, TypeId::NULL]);
        let u2 = ctx.union_type(vec![TypeId::I64, TypeId::NULL]);
        assert_eq!(u1, u2);
    }

    #[test]
    fn test_reify_is_memoized() {
        let mut ctx = TypeContext::new();
        let boxed = ctx.declare_class(ClassId(0), "Box", &["T".to_string()]);
        let t = ctx.class(boxed).unwrap().generic_params[0];
        ctx.define_class(
            boxed,
            vec![Field {
                name: "value".into(),
                ty: t,
            }],
            vec![],
            vec![],
        );

        let b1 = ctx.reify(boxed, &[TypeId::I64]).unwrap();
        let b2 = ctx.reify(boxed, &[TypeId::I64]).unwrap();
        let b3 = ctx.reify(boxed, &[TypeId::STRING]).unwrap();
        assert_eq!(b1, b2);
        assert_ne!(b1, b3);
        assert_eq!(ctx.display(b1), "Box<i64>");
        assert_eq!(ctx.class(b1).unwrap().fields[0].ty, TypeId::I64);
        assert_eq!(ctx.class(b3).unwrap().fields[0].ty, TypeId::STRING);
        assert_eq!(ctx.reify(boxed, &[t]), Some(boxed));
        assert_eq!(ctx.reify(boxed, &[]), None);
    }

    #[test]
    fn test_reify_before_members_are_defined() {
        let mut ctx = TypeContext::new();
        let node = ctx.declare_class(ClassId(0), "Node", &["T".to_string()]);
        let t = ctx.class(node).unwrap().generic_params[0];
        let early = ctx.reify(node, &[TypeId::BOOL]).unwrap();
        assert!(ctx.class(early).unwrap().fields.is_empty());

        // Self-referential field: next: Node<T>
        ctx.define_class(
            node,
            vec![
                Field { name: "value".into(), ty: t },
                Field { name: "next".into(), ty: node },
            ],
            vec![],
            vec![],
        );
        let fields = &ctx.class(early).unwrap().fields;
        assert_eq!(fields[0].ty, TypeId::BOOL);
        assert_eq!(fields[1].ty, early);
    }
}
