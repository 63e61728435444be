//! The rill type universe.
//!
//! The universe is closed: four basic types, fixed-length arrays over the
//! basic types, function types, and a poison type for checked-but-broken
//! expressions. Every type is interned in a process-wide flyweight table, so
//! type equality is pointer identity and costs one comparison. The table is
//! append-only and never revisited after construction.

use std::sync::{Arc, RwLock};

use hashbrown::HashSet;
use once_cell::sync::Lazy;

#[doc(hidden)]
mod private {
    #[doc(hidden)]
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct PrivateZst;
}

/// Thin pointer to an interned type kind. Do not construct directly; use
/// [`basic`], [`array`], [`function`], or [`error`], which return the unique
/// instance for their parameters.
#[derive(Clone)]
pub struct Type(Arc<TypeKind>, private::PrivateZst);

/// Types are interned, so referential equality is type equality.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl core::ops::Deref for Type {
    type Target = TypeKind;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl core::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Type").field(&self.0).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// int, byte, bool, void
    Basic(BasicKind),
    /// `base array[length]`
    ///
    /// Fixed length, one-dimensional, element type always basic and never
    /// void.
    Array { base: BasicKind, length: u32 },
    /// The type of a function: formal types in declaration order plus the
    /// return type.
    Fn(FnType),
    /// The type produced by an expression we could not make sense of. If you
    /// find this in a type, an error has already been reported; do not emit
    /// another one.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnType {
    pub formals: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BasicKind {
    Int,
    Byte,
    Bool,
    Void,
}

/// The flyweight table. Entries live for the rest of the process; the table
/// only ever grows.
static FLYWEIGHTS: Lazy<RwLock<HashSet<Arc<TypeKind>>>> = Lazy::new(Default::default);

fn intern(kind: TypeKind) -> Type {
    let mut table = FLYWEIGHTS.write().unwrap();

    if let Some(existing) = table.get(&kind) {
        return Type(Arc::clone(existing), private::PrivateZst);
    }

    let arc = Arc::new(kind);
    table.insert(Arc::clone(&arc));
    Type(arc, private::PrivateZst)
}

/// The unique instance of a basic type.
pub fn basic(kind: BasicKind) -> Type {
    intern(TypeKind::Basic(kind))
}

/// The unique array type over `base` with the given length.
///
/// Arrays of void do not exist in the universe; name analysis rejects the
/// declaration before this can be reached.
pub fn array(base: BasicKind, length: u32) -> Type {
    assert!(
        base != BasicKind::Void,
        "array over void is not a constructible type"
    );

    intern(TypeKind::Array { base, length })
}

/// The unique function type with the given signature.
pub fn function(formals: Vec<Type>, ret: Type) -> Type {
    intern(TypeKind::Fn(FnType { formals, ret }))
}

/// The poison type.
pub fn error() -> Type {
    intern(TypeKind::Error)
}

impl Type {
    /// Storage size in bytes. Void has no storage; the 8 reported here is
    /// its width for non-storage purposes.
    pub fn size(&self) -> usize {
        match &**self {
            TypeKind::Basic(BasicKind::Byte | BasicKind::Bool) => 1,
            TypeKind::Basic(BasicKind::Int | BasicKind::Void) => 8,
            TypeKind::Array { base, length } => {
                basic(*base).size() * (*length as usize)
            }
            TypeKind::Fn(_) | TypeKind::Error => 0,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(&**self, TypeKind::Basic(BasicKind::Void))
    }

    pub fn is_int(&self) -> bool {
        matches!(&**self, TypeKind::Basic(BasicKind::Int))
    }

    pub fn is_bool(&self) -> bool {
        matches!(&**self, TypeKind::Basic(BasicKind::Bool))
    }

    pub fn is_byte(&self) -> bool {
        matches!(&**self, TypeKind::Basic(BasicKind::Byte))
    }

    pub fn is_array(&self) -> bool {
        matches!(&**self, TypeKind::Array { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(&**self, TypeKind::Error)
    }

    pub fn as_basic(&self) -> Option<BasicKind> {
        match &**self {
            TypeKind::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<(BasicKind, u32)> {
        match &**self {
            TypeKind::Array { base, length } => Some((*base, *length)),
            _ => None,
        }
    }

    pub fn as_fn(&self) -> Option<&FnType> {
        match &**self {
            TypeKind::Fn(fn_type) => Some(fn_type),
            _ => None,
        }
    }

    /// Whether a variable may be declared with this type. Void, function
    /// types, and the poison type are not storable.
    pub fn valid_var_type(&self) -> bool {
        match &**self {
            TypeKind::Basic(kind) => *kind != BasicKind::Void,
            TypeKind::Array { .. } => true,
            TypeKind::Fn(_) | TypeKind::Error => false,
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &**self {
            TypeKind::Basic(kind) => write!(f, "{kind}"),
            TypeKind::Array { base, length } => write!(f, "{base} array[{length}]"),
            TypeKind::Fn(FnType { formals, ret }) => {
                for (i, formal) in formals.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{formal}")?;
                }
                write!(f, "->{ret}")
            }
            TypeKind::Error => write!(f, "ERROR"),
        }
    }
}
