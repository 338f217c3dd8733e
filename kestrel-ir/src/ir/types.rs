//! Types, entities, and the program-wide stores for both.
//!
//! A `TypeRef` describes the layout of values (primitives wrap a mode,
//! compounds own ordered member entities, method types carry signatures); an
//! `Entity` is a named storage location or method belonging to an owner
//! type. Both live in the `TypeStore` together with the interned identifier
//! table, since the three reference each other constantly.

use crate::fx::FxHashMap;
use crate::ir::entities::{Entity, GraphRef, Ident, TypeRef};
use crate::ir::modes::{self, Mode};
use crate::ir::tarval::Tarval;
use kestrel_entity::packed_option::PackedOption;
use kestrel_entity::PrimaryMap;
use std::string::String;
use std::vec::Vec;

/// The layout state of a type.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LayoutState {
    /// Size and member offsets have not been fixed yet.
    Undefined,
    /// Size and member offsets are final.
    Fixed,
}

/// The flavor of a compound type.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CompoundKind {
    /// Members laid out sequentially.
    Struct,
    /// Members all at offset 0.
    Union,
    /// Like `Struct`, plus inheritance via entity overwrites.
    Class,
}

/// One dimension of an array type.
#[derive(Copy, Clone, Debug)]
pub struct ArrayDim {
    /// The lower bound, usually 0.
    pub lower: i64,
    /// The upper bound (exclusive), or `None` while unknown.
    pub upper: Option<i64>,
}

/// What a type describes.
#[derive(Clone, Debug)]
pub enum TypeKind {
    /// A primitive type wrapping a mode.
    Primitive {
        /// The mode of values of this type.
        mode: Mode,
    },
    /// A pointer type.
    Pointer {
        /// The pointed-to type.
        points_to: TypeRef,
    },
    /// An array type.
    Array {
        /// The element type.
        element: TypeRef,
        /// The dimensions, outermost first.
        dims: Vec<ArrayDim>,
    },
    /// A compound type with ordered members.
    Compound {
        /// Struct, union or class.
        kind: CompoundKind,
        /// The member entities, in declaration order.
        members: Vec<Entity>,
    },
    /// A method type.
    Method {
        /// The parameter types, in order.
        params: Vec<TypeRef>,
        /// The result types, in order.
        results: Vec<TypeRef>,
        /// Calling convention bits, opaque to the core.
        calling_convention: u32,
    },
    /// An enumeration type.
    Enumeration {
        /// The named enumerators and their values.
        enumerators: Vec<(Ident, Tarval)>,
    },
    /// The unknown type.
    Unknown,
}

/// A type descriptor.
#[derive(Clone, Debug)]
pub struct TypeData {
    /// What the type describes.
    pub kind: TypeKind,
    /// An optional name, present on compounds.
    pub name: PackedOption<Ident>,
    /// Whether size and offsets are fixed.
    pub state: LayoutState,
    /// The size in bytes, valid once the layout is fixed.
    pub size: u32,
    /// The alignment in bytes, valid once the layout is fixed.
    pub align: u32,
}

/// How an entity's storage is allocated.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Allocation {
    /// On the stack frame of a procedure.
    Automatic,
    /// In static memory.
    Static,
}

/// Who can see and who allocates an entity.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Visibility {
    /// Only this compilation unit.
    Local,
    /// Visible to other units; allocated here.
    ExternalVisible,
    /// Visible and allocated elsewhere.
    ExternalAllocated,
}

/// Whether and how an entity's value may change.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Variability {
    /// No initializer, mutable.
    Uninitialized,
    /// Initialized and immutable.
    Constant,
    /// Initialized and mutable.
    Initialized,
}

/// Whether accesses to an entity may be reordered or removed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Volatility {
    /// Ordinary accesses.
    NonVolatile,
    /// Every access is an observable effect.
    Volatile,
}

/// An initial value of an entity.
#[derive(Clone, Debug)]
pub enum Initializer {
    /// A constant scalar value.
    Scalar(Tarval),
    /// Sub-initializers for the members of a compound or array.
    Compound(Vec<Initializer>),
}

/// An entity: a named storage location or method member of an owner type.
#[derive(Clone, Debug)]
pub struct EntityData {
    /// The source-level name.
    pub name: Ident,
    /// The linker name; mangled on demand, see [`TypeStore::linker_name`].
    pub linker_name: PackedOption<Ident>,
    /// The type of the entity's value.
    pub ty: TypeRef,
    /// The owner type.
    pub owner: TypeRef,
    /// Storage allocation class.
    pub allocation: Allocation,
    /// Linkage visibility.
    pub visibility: Visibility,
    /// Mutability of the value.
    pub variability: Variability,
    /// Volatility of accesses.
    pub volatility: Volatility,
    /// Offset within the owner in bytes; -1 while the layout is undefined.
    pub offset: i32,
    /// The initial value, if any.
    pub initializer: Option<Initializer>,
    /// The procedure graph of a method entity.
    pub graph: PackedOption<GraphRef>,
    /// Entities of supertypes this entity overwrites.
    pub overwrites: Vec<Entity>,
    /// Entities of subtypes overwriting this entity.
    pub overwritten_by: Vec<Entity>,
}

/// The program-wide store of idents, types and entities.
#[derive(Clone, Debug)]
pub struct TypeStore {
    strings: PrimaryMap<Ident, String>,
    interned: FxHashMap<String, Ident>,
    types: PrimaryMap<TypeRef, TypeData>,
    entities: PrimaryMap<Entity, EntityData>,
    /// The compound owning all static entities of the program.
    pub global_type: TypeRef,
    /// The type of values nothing is known about.
    pub unknown_type: TypeRef,
}

impl TypeStore {
    /// Create a store with the predefined global and unknown types.
    pub fn new() -> Self {
        let mut store = Self {
            strings: PrimaryMap::new(),
            interned: FxHashMap::default(),
            types: PrimaryMap::new(),
            entities: PrimaryMap::new(),
            global_type: TypeRef::from_u32(0).unwrap(),
            unknown_type: TypeRef::from_u32(0).unwrap(),
        };
        let global_name = store.ident("GlobalType");
        store.global_type = store.types.push(TypeData {
            kind: TypeKind::Compound {
                kind: CompoundKind::Struct,
                members: Vec::new(),
            },
            name: global_name.into(),
            state: LayoutState::Undefined,
            size: 0,
            align: 1,
        });
        store.unknown_type = store.types.push(TypeData {
            kind: TypeKind::Unknown,
            name: PackedOption::default(),
            state: LayoutState::Fixed,
            size: 0,
            align: 1,
        });
        store
    }

    /// Intern a string, returning its ident.
    pub fn ident(&mut self, s: &str) -> Ident {
        if let Some(&id) = self.interned.get(s) {
            return id;
        }
        let id = self.strings.push(String::from(s));
        self.interned.insert(String::from(s), id);
        id
    }

    /// The string of an ident.
    pub fn ident_str(&self, id: Ident) -> &str {
        &self.strings[id]
    }

    /// Access a type descriptor.
    pub fn ty(&self, t: TypeRef) -> &TypeData {
        &self.types[t]
    }

    /// Access a type descriptor, mutable edition.
    pub fn ty_mut(&mut self, t: TypeRef) -> &mut TypeData {
        &mut self.types[t]
    }

    /// Access an entity.
    pub fn entity(&self, e: Entity) -> &EntityData {
        &self.entities[e]
    }

    /// Access an entity, mutable edition.
    pub fn entity_mut(&mut self, e: Entity) -> &mut EntityData {
        &mut self.entities[e]
    }

    /// Create a primitive type wrapping `mode`.
    pub fn new_primitive(&mut self, mode: Mode) -> TypeRef {
        self.types.push(TypeData {
            kind: TypeKind::Primitive { mode },
            name: PackedOption::default(),
            state: LayoutState::Fixed,
            size: mode.bytes(),
            align: mode.alignment(),
        })
    }

    /// Create a pointer type.
    pub fn new_pointer(&mut self, points_to: TypeRef) -> TypeRef {
        self.types.push(TypeData {
            kind: TypeKind::Pointer { points_to },
            name: PackedOption::default(),
            state: LayoutState::Fixed,
            size: modes::P.bytes(),
            align: modes::P.alignment(),
        })
    }

    /// Create an array type. The layout is fixed once all dimension bounds
    /// are known and the element layout is fixed.
    pub fn new_array(&mut self, element: TypeRef, dims: Vec<ArrayDim>) -> TypeRef {
        let elem = &self.types[element];
        let count: Option<i64> = dims
            .iter()
            .map(|d| d.upper.map(|u| u - d.lower))
            .fold(Some(1), |acc, n| match (acc, n) {
                (Some(a), Some(b)) if b >= 0 => Some(a * b),
                _ => None,
            });
        let (state, size) = match (elem.state, count) {
            (LayoutState::Fixed, Some(n)) => (LayoutState::Fixed, elem.size * n as u32),
            _ => (LayoutState::Undefined, 0),
        };
        let align = elem.align;
        self.types.push(TypeData {
            kind: TypeKind::Array { element, dims },
            name: PackedOption::default(),
            state,
            size,
            align,
        })
    }

    /// Create an empty compound type. Members are added by `new_entity`;
    /// the layout stays undefined until `default_layout_compound_type`.
    pub fn new_compound(&mut self, kind: CompoundKind, name: &str) -> TypeRef {
        let name = self.ident(name);
        self.types.push(TypeData {
            kind: TypeKind::Compound {
                kind,
                members: Vec::new(),
            },
            name: name.into(),
            state: LayoutState::Undefined,
            size: 0,
            align: 1,
        })
    }

    /// Create a method type.
    pub fn new_method(&mut self, params: Vec<TypeRef>, results: Vec<TypeRef>) -> TypeRef {
        self.types.push(TypeData {
            kind: TypeKind::Method {
                params,
                results,
                calling_convention: 0,
            },
            name: PackedOption::default(),
            state: LayoutState::Fixed,
            size: 0,
            align: 1,
        })
    }

    /// Create an enumeration type over `mode`.
    pub fn new_enumeration(&mut self, enumerators: Vec<(Ident, Tarval)>, mode: Mode) -> TypeRef {
        self.types.push(TypeData {
            kind: TypeKind::Enumeration { enumerators },
            name: PackedOption::default(),
            state: LayoutState::Fixed,
            size: mode.bytes(),
            align: mode.alignment(),
        })
    }

    /// Create an entity named `name` of type `ty` owned by `owner`.
    ///
    /// Compound owners record the entity as their next member; the member
    /// order is the creation order and is stable.
    pub fn new_entity(&mut self, owner: TypeRef, name: &str, ty: TypeRef) -> Entity {
        let name = self.ident(name);
        let ent = self.entities.push(EntityData {
            name,
            linker_name: PackedOption::default(),
            ty,
            owner,
            allocation: if owner == self.global_type {
                Allocation::Static
            } else {
                Allocation::Automatic
            },
            visibility: Visibility::Local,
            variability: Variability::Uninitialized,
            volatility: Volatility::NonVolatile,
            offset: -1,
            initializer: None,
            graph: PackedOption::default(),
            overwrites: Vec::new(),
            overwritten_by: Vec::new(),
        });
        if let TypeKind::Compound { members, .. } = &mut self.types[owner].kind {
            members.push(ent);
        }
        ent
    }

    /// The linker name of an entity, mangling `Owner_name` on first use.
    pub fn linker_name(&mut self, e: Entity) -> Ident {
        if let Some(ld) = self.entities[e].linker_name.expand() {
            return ld;
        }
        let owner = self.entities[e].owner;
        let mangled = match self.types[owner].name.expand() {
            Some(owner_name) => format!(
                "{}_{}",
                self.ident_str(owner_name),
                self.ident_str(self.entities[e].name)
            ),
            None => String::from(self.ident_str(self.entities[e].name)),
        };
        let ld = self.ident(&mangled);
        self.entities[e].linker_name = ld.into();
        ld
    }

    /// The mode of values of a type: the wrapped mode of primitives and
    /// enumerations, `P` for pointers, `None` for aggregates.
    pub fn type_mode(&self, t: TypeRef) -> Option<Mode> {
        match &self.types[t].kind {
            TypeKind::Primitive { mode } => Some(*mode),
            TypeKind::Pointer { .. } => Some(modes::P),
            TypeKind::Enumeration { enumerators } => {
                enumerators.first().map(|(_, tv)| tv.mode())
            }
            _ => None,
        }
    }

    /// Fix the layout of a compound type by laying out the members in order
    /// with natural alignment. Member entity offsets are updated together
    /// with the type size, so observers never see a half-fixed layout.
    pub fn default_layout_compound_type(&mut self, t: TypeRef) {
        let (kind, members) = match &self.types[t].kind {
            TypeKind::Compound { kind, members } => (*kind, members.clone()),
            _ => panic!("default_layout_compound_type on non-compound {}", t),
        };
        let mut offset = 0u32;
        let mut align = 1u32;
        let mut size = 0u32;
        for m in &members {
            let mty = self.entities[*m].ty;
            let (msize, malign) = (self.types[mty].size, self.types[mty].align);
            debug_assert_eq!(
                self.types[mty].state,
                LayoutState::Fixed,
                "member {} has unfixed layout",
                m
            );
            align = align.max(malign);
            match kind {
                CompoundKind::Union => {
                    self.entities[*m].offset = 0;
                    size = size.max(msize);
                }
                CompoundKind::Struct | CompoundKind::Class => {
                    offset = (offset + malign - 1) / malign * malign;
                    self.entities[*m].offset = offset as i32;
                    offset += msize;
                    size = offset;
                }
            }
        }
        let data = &mut self.types[t];
        data.size = (size + align - 1) / align * align;
        data.align = align;
        data.state = LayoutState::Fixed;
    }

    /// The member entities of a compound type.
    pub fn members(&self, t: TypeRef) -> &[Entity] {
        match &self.types[t].kind {
            TypeKind::Compound { members, .. } => members,
            _ => &[],
        }
    }

    /// The number of parameters of a method type.
    pub fn n_params(&self, t: TypeRef) -> usize {
        match &self.types[t].kind {
            TypeKind::Method { params, .. } => params.len(),
            _ => 0,
        }
    }

    /// The `i`-th parameter type of a method type.
    pub fn param_type(&self, t: TypeRef, i: usize) -> TypeRef {
        match &self.types[t].kind {
            TypeKind::Method { params, .. } => params[i],
            _ => panic!("param_type on non-method {}", t),
        }
    }

    /// The number of results of a method type.
    pub fn n_results(&self, t: TypeRef) -> usize {
        match &self.types[t].kind {
            TypeKind::Method { results, .. } => results.len(),
            _ => 0,
        }
    }

    /// The `i`-th result type of a method type.
    pub fn result_type(&self, t: TypeRef, i: usize) -> TypeRef {
        match &self.types[t].kind {
            TypeKind::Method { results, .. } => results[i],
            _ => panic!("result_type on non-method {}", t),
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_interning() {
        let mut store = TypeStore::new();
        let a = store.ident("x");
        let b = store.ident("y");
        let c = store.ident("x");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(store.ident_str(a), "x");
    }

    #[test]
    fn struct_layout() {
        let mut store = TypeStore::new();
        let i8t = store.new_primitive(modes::IS8);
        let i32t = store.new_primitive(modes::IS32);
        let s = store.new_compound(CompoundKind::Struct, "S");
        let a = store.new_entity(s, "a", i8t);
        let b = store.new_entity(s, "b", i32t);
        let c = store.new_entity(s, "c", i8t);

        assert_eq!(store.ty(s).state, LayoutState::Undefined);
        store.default_layout_compound_type(s);

        assert_eq!(store.entity(a).offset, 0);
        assert_eq!(store.entity(b).offset, 4);
        assert_eq!(store.entity(c).offset, 8);
        assert_eq!(store.ty(s).size, 12);
        assert_eq!(store.ty(s).align, 4);
        assert_eq!(store.ty(s).state, LayoutState::Fixed);
        assert_eq!(store.members(s), &[a, b, c]);
    }

    #[test]
    fn union_layout() {
        let mut store = TypeStore::new();
        let i64t = store.new_primitive(modes::IS64);
        let i16t = store.new_primitive(modes::IS16);
        let u = store.new_compound(CompoundKind::Union, "U");
        let a = store.new_entity(u, "a", i64t);
        let b = store.new_entity(u, "b", i16t);
        store.default_layout_compound_type(u);

        assert_eq!(store.entity(a).offset, 0);
        assert_eq!(store.entity(b).offset, 0);
        assert_eq!(store.ty(u).size, 8);
    }

    #[test]
    fn array_size() {
        let mut store = TypeStore::new();
        let i32t = store.new_primitive(modes::IS32);
        let arr = store.new_array(
            i32t,
            vec![ArrayDim {
                lower: 0,
                upper: Some(10),
            }],
        );
        assert_eq!(store.ty(arr).size, 40);
        assert_eq!(store.ty(arr).state, LayoutState::Fixed);

        let open = store.new_array(i32t, vec![ArrayDim { lower: 0, upper: None }]);
        assert_eq!(store.ty(open).state, LayoutState::Undefined);
    }

    #[test]
    fn linker_name_mangling() {
        let mut store = TypeStore::new();
        let i32t = store.new_primitive(modes::IS32);
        let s = store.new_compound(CompoundKind::Struct, "Point");
        let x = store.new_entity(s, "x", i32t);
        let ld = store.linker_name(x);
        assert_eq!(store.ident_str(ld), "Point_x");
        // Mangling is stable.
        assert_eq!(store.linker_name(x), ld);
    }

    #[test]
    fn global_entities_are_static() {
        let mut store = TypeStore::new();
        let i32t = store.new_primitive(modes::IS32);
        let g = store.global_type;
        let e = store.new_entity(g, "counter", i32t);
        assert_eq!(store.entity(e).allocation, Allocation::Static);
    }
}
