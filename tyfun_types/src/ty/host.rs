//! The host-side type tree.
//!
//! `HostTy` is what the type checker owns: a plain acyclic value with
//! derived equality and hashing, which makes it directly usable as a
//! memoization key. It crosses into a reduction only through the
//! serializer, which materializes a fresh `TypeValue` per reduction.

use super::value::Key;

/// A host-registered nominal type, identified by its registry index.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClassId(pub u32);

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct HostProp {
    pub read: Option<HostTy>,
    pub write: Option<HostTy>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct HostIndexer {
    pub key: HostTy,
    pub read: HostTy,
    pub write: HostTy,
}

/// Properties are kept sorted by key so that structurally equal tables
/// compare and hash equal regardless of insertion order.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct HostTable {
    pub props: Vec<(Key, HostProp)>,
    pub indexer: Option<Box<HostIndexer>>,
    pub metatable: Option<Box<HostTy>>,
}

impl HostTable {
    pub fn new() -> HostTable {
        HostTable { props: Vec::new(), indexer: None, metatable: None }
    }

    /// Inserts or replaces a property, keeping the sort order.
    pub fn set_prop(&mut self, key: Key, prop: HostProp) {
        match self.props.binary_search_by(|&(ref k, _)| k.cmp(&key)) {
            Ok(i) => self.props[i].1 = prop,
            Err(i) => self.props.insert(i, (key, prop)),
        }
    }

    pub fn prop(&self, key: &Key) -> Option<&HostProp> {
        self.props.binary_search_by(|&(ref k, _)| k.cmp(key))
                  .ok().map(|i| &self.props[i].1)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct HostSeq {
    pub head: Vec<HostTy>,
    pub tail: Option<Box<HostTy>>,
}

impl HostSeq {
    pub fn empty() -> HostSeq {
        HostSeq { head: Vec::new(), tail: None }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct HostFunc {
    pub params: HostSeq,
    pub returns: HostSeq,
}

/// A host type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum HostTy {
    Nil,
    Unknown,
    Never,
    Any,
    Boolean,
    Number,
    String,
    BoolSingleton(bool),
    StrSingleton(String),
    Negation(Box<HostTy>),
    Union(Vec<HostTy>),
    Intersection(Vec<HostTy>),
    Table(Box<HostTable>),
    Function(Box<HostFunc>),
    Class(ClassId),

    /// The placeholder a failed or timed-out reduction resolves to.
    /// It cannot be serialized back into a later reduction.
    Error,
}

impl HostTy {
    pub fn str_singleton<S: Into<String>>(s: S) -> HostTy {
        HostTy::StrSingleton(s.into())
    }
}
