//! The type value model.
//!
//! A `TypeValue` is the representation of a static type handed to a running
//! type function. Primitives are plain variants and compare structurally;
//! tables and functions are heap handles with reference semantics, so two
//! clones of the same handle alias the same underlying data and `copy` is
//! the only way to break the aliasing. Classes are host-constructed and
//! read-only.
//!
//! Equality is *syntactic*: `boolean` and `true | false` denote the same set
//! of values but are unequal. Tables can be made cyclic through their
//! metatables, so every recursive walk here carries a visited set.

use std::fmt;
use std::rc::Rc;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::flags::Flags;
use super::host::ClassId;

/// The tag of a type value, used by the `tag`/`is` reflection surface.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Tag {
    Nil,
    Unknown,
    Never,
    Any,
    Boolean,
    Number,
    String,
    Singleton,
    Negation,
    Union,
    Intersection,
    Table,
    Function,
    Class,
}

impl Tag {
    pub fn name(&self) -> &'static str {
        match *self {
            Tag::Nil => "nil",
            Tag::Unknown => "unknown",
            Tag::Never => "never",
            Tag::Any => "any",
            Tag::Boolean => "boolean",
            Tag::Number => "number",
            Tag::String => "string",
            Tag::Singleton => "singleton",
            Tag::Negation => "negation",
            Tag::Union => "union",
            Tag::Intersection => "intersection",
            Tag::Table => "table",
            Tag::Function => "function",
            Tag::Class => "class",
        }
    }

    pub fn from_name(name: &str) -> Option<Tag> {
        let tag = match name {
            "nil" => Tag::Nil,
            "unknown" => Tag::Unknown,
            "never" => Tag::Never,
            "any" => Tag::Any,
            "boolean" => Tag::Boolean,
            "number" => Tag::Number,
            "string" => Tag::String,
            "singleton" => Tag::Singleton,
            "negation" => Tag::Negation,
            "union" => Tag::Union,
            "intersection" => Tag::Intersection,
            "table" => Tag::Table,
            "function" => Tag::Function,
            "class" => Tag::Class,
            _ => return None,
        };
        Some(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self.name(), f)
    }
}

/// A singleton value, also used as a table property key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Key {
    Bool(bool),
    Str(String),
}

impl Key {
    /// Extracts a property key from a type value; only singletons qualify.
    pub fn from_type_value(v: &TypeValue) -> Result<Key, ConstructionError> {
        match *v {
            TypeValue::Singleton(ref key) => Ok(key.clone()),
            _ => Err(ConstructionError::InvalidKey { tag: v.tag() }),
        }
    }
}

/// A table or class property: the type read out of it and the type
/// accepted into it, either possibly absent.
#[derive(Clone, Debug)]
pub struct Property {
    pub read: Option<TypeValue>,
    pub write: Option<TypeValue>,
}

/// A table or class indexer.
#[derive(Clone, Debug)]
pub struct Indexer {
    pub key: TypeValue,
    pub read: TypeValue,
    pub write: TypeValue,
}

/// An ordered list of types with an optional variadic tail,
/// used for function parameters and returns.
#[derive(Clone, Debug)]
pub struct TypeSeq {
    pub head: Vec<TypeValue>,
    pub tail: Option<Box<TypeValue>>,
}

impl TypeSeq {
    pub fn empty() -> TypeSeq {
        TypeSeq { head: Vec::new(), tail: None }
    }
}

#[derive(Debug)]
pub struct TableData {
    pub props: BTreeMap<Key, Property>,
    pub indexer: Option<Indexer>,
    pub metatable: Option<TypeValue>,
}

impl TableData {
    pub fn new() -> TableData {
        TableData { props: BTreeMap::new(), indexer: None, metatable: None }
    }
}

#[derive(Debug)]
pub struct FuncData {
    pub params: TypeSeq,
    pub returns: TypeSeq,
}

impl FuncData {
    pub fn new() -> FuncData {
        FuncData { params: TypeSeq::empty(), returns: TypeSeq::empty() }
    }
}

/// A host-constructed nominal type. Immutable from the sandbox.
#[derive(Debug)]
pub struct ClassData {
    pub id: ClassId,
    pub name: String,
    pub props: BTreeMap<Key, Property>,
    pub parent: Option<TypeValue>,
    pub metatable: Option<TypeValue>,
    pub indexer: Option<Indexer>,
}

pub type TableRef = Rc<RefCell<TableData>>;
pub type FuncRef = Rc<RefCell<FuncData>>;

/// An error from a type value constructor. Catchable inside the sandbox
/// like any other runtime error.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConstructionError {
    /// A union or intersection was given fewer than two components.
    InvalidArity { given: usize },

    /// A table property key was not a singleton type.
    InvalidKey { tag: Tag },

    /// A negation would wrap a type without a runtime test.
    UnsupportedNegation { tag: Tag },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConstructionError::InvalidArity { given } =>
                write!(f, "expected at least 2 types, got {}", given),
            ConstructionError::InvalidKey { tag } =>
                write!(f, "table keys should be singleton types, got {}", tag),
            ConstructionError::UnsupportedNegation { tag } =>
                write!(f, "cannot negate a {} type", tag),
        }
    }
}

/// A type value.
#[derive(Clone, Debug)]
pub enum TypeValue {
    Nil,
    Unknown,
    Never,
    Any,
    Boolean,
    Number,
    String,
    Singleton(Key),
    Negation(Box<TypeValue>),
    /// At least two components, in construction order, syntactically distinct.
    Union(Vec<TypeValue>),
    /// Same representation contract as `Union`.
    Intersection(Vec<TypeValue>),
    Table(TableRef),
    Function(FuncRef),
    Class(Rc<ClassData>),
}

impl TypeValue {
    pub fn tag(&self) -> Tag {
        match *self {
            TypeValue::Nil => Tag::Nil,
            TypeValue::Unknown => Tag::Unknown,
            TypeValue::Never => Tag::Never,
            TypeValue::Any => Tag::Any,
            TypeValue::Boolean => Tag::Boolean,
            TypeValue::Number => Tag::Number,
            TypeValue::String => Tag::String,
            TypeValue::Singleton(..) => Tag::Singleton,
            TypeValue::Negation(..) => Tag::Negation,
            TypeValue::Union(..) => Tag::Union,
            TypeValue::Intersection(..) => Tag::Intersection,
            TypeValue::Table(..) => Tag::Table,
            TypeValue::Function(..) => Tag::Function,
            TypeValue::Class(..) => Tag::Class,
        }
    }

    pub fn is(&self, tag: Tag) -> bool {
        self.tag() == tag
    }

    /// Constructs a singleton; a nil singleton is the `nil` type itself.
    pub fn singleton(key: Option<Key>) -> TypeValue {
        match key {
            Some(key) => TypeValue::Singleton(key),
            None => TypeValue::Nil,
        }
    }

    pub fn bool_singleton(v: bool) -> TypeValue {
        TypeValue::Singleton(Key::Bool(v))
    }

    pub fn str_singleton<S: Into<String>>(s: S) -> TypeValue {
        TypeValue::Singleton(Key::Str(s.into()))
    }

    pub fn negation_of(inner: TypeValue) -> Result<TypeValue, ConstructionError> {
        if !inner.flags().is_testable() {
            return Err(ConstructionError::UnsupportedNegation { tag: inner.tag() });
        }
        Ok(TypeValue::Negation(Box::new(inner)))
    }

    pub fn union_of(components: Vec<TypeValue>) -> Result<TypeValue, ConstructionError> {
        let components = Self::check_components(components)?;
        if components.len() == 1 {
            // all components were syntactically equal
            Ok(components.into_iter().next().expect("components became empty"))
        } else {
            Ok(TypeValue::Union(components))
        }
    }

    pub fn intersection_of(components: Vec<TypeValue>) -> Result<TypeValue, ConstructionError> {
        let components = Self::check_components(components)?;
        if components.len() == 1 {
            Ok(components.into_iter().next().expect("components became empty"))
        } else {
            Ok(TypeValue::Intersection(components))
        }
    }

    // checks the arity and removes syntactic duplicates, keeping the first occurrence
    fn check_components(components: Vec<TypeValue>)
            -> Result<Vec<TypeValue>, ConstructionError> {
        if components.len() < 2 {
            return Err(ConstructionError::InvalidArity { given: components.len() });
        }
        let mut distinct: Vec<TypeValue> = Vec::with_capacity(components.len());
        for c in components {
            if !distinct.iter().any(|d| *d == c) {
                distinct.push(c);
            }
        }
        Ok(distinct)
    }

    pub fn new_table() -> TypeValue {
        TypeValue::Table(Rc::new(RefCell::new(TableData::new())))
    }

    pub fn new_function(params: TypeSeq, returns: TypeSeq) -> TypeValue {
        TypeValue::Function(Rc::new(RefCell::new(FuncData { params: params,
                                                            returns: returns })))
    }

    pub fn table(&self) -> Option<&TableRef> {
        match *self { TypeValue::Table(ref t) => Some(t), _ => None }
    }

    pub fn func(&self) -> Option<&FuncRef> {
        match *self { TypeValue::Function(ref f) => Some(f), _ => None }
    }

    pub fn class(&self) -> Option<&Rc<ClassData>> {
        match *self { TypeValue::Class(ref c) => Some(c), _ => None }
    }

    /// The kinds of values appearing anywhere in this type, looking through
    /// unions, intersections and negations. Table and function internals are
    /// not inspected (they cannot affect testability).
    pub fn flags(&self) -> Flags {
        match *self {
            TypeValue::Nil => Flags::T_NIL,
            TypeValue::Unknown => Flags::T_UNKNOWN,
            TypeValue::Never => Flags::T_NEVER,
            TypeValue::Any => Flags::T_ANY,
            TypeValue::Boolean => Flags::T_BOOLEAN,
            TypeValue::Number => Flags::T_NUMBER,
            TypeValue::String => Flags::T_STRING,
            TypeValue::Singleton(Key::Bool(_)) => Flags::T_BOOLEAN,
            TypeValue::Singleton(Key::Str(_)) => Flags::T_STRING,
            TypeValue::Negation(ref inner) => Flags::T_NEGATION | inner.flags(),
            TypeValue::Union(ref cs) | TypeValue::Intersection(ref cs) => {
                cs.iter().fold(Flags::T_NONE, |acc, c| acc | c.flags())
            }
            TypeValue::Table(..) => Flags::T_TABLE,
            TypeValue::Function(..) => Flags::T_FUNCTION,
            TypeValue::Class(..) => Flags::T_CLASS,
        }
    }

    /// Deep structural clone. Breaks the aliasing of table and function
    /// handles while preserving internal sharing and cycles; classes are
    /// immutable and stay shared.
    pub fn copy(&self) -> TypeValue {
        let mut memo = HashMap::new();
        copy_rec(self, &mut memo)
    }

    /// Whether at least one leaf component (through unions and intersections)
    /// has the given tag.
    pub fn has_subtype(&self, tag: Tag) -> bool {
        self.any_leaf(&mut |leaf| leaf.tag() == tag)
    }

    /// Whether every leaf component has the given tag.
    pub fn has_only_subtype(&self, tag: Tag) -> bool {
        self.all_leaves(&mut |leaf| leaf.tag() == tag)
    }

    /// Whether at least one leaf component is a subtype of `other`.
    pub fn has_subtype_of(&self, other: &TypeValue) -> bool {
        self.any_leaf(&mut |leaf| leaf_subtype_of(leaf, other))
    }

    /// Whether every leaf component is a subtype of `other`.
    pub fn has_only_subtype_of(&self, other: &TypeValue) -> bool {
        self.all_leaves(&mut |leaf| leaf_subtype_of(leaf, other))
    }

    fn any_leaf(&self, pred: &mut FnMut(&TypeValue) -> bool) -> bool {
        match *self {
            TypeValue::Union(ref cs) | TypeValue::Intersection(ref cs) =>
                cs.iter().any(|c| c.any_leaf(pred)),
            _ => pred(self),
        }
    }

    fn all_leaves(&self, pred: &mut FnMut(&TypeValue) -> bool) -> bool {
        match *self {
            TypeValue::Union(ref cs) | TypeValue::Intersection(ref cs) =>
                cs.iter().all(|c| c.all_leaves(pred)),
            _ => pred(self),
        }
    }
}

fn copy_rec(v: &TypeValue, memo: &mut HashMap<usize, TypeValue>) -> TypeValue {
    let copy_opt = |v: &Option<TypeValue>, memo: &mut HashMap<usize, TypeValue>| {
        v.as_ref().map(|v| copy_rec(v, memo))
    };

    match *v {
        TypeValue::Table(ref t) => {
            let ptr = Rc::as_ptr(t) as usize;
            if let Some(copied) = memo.get(&ptr) {
                return copied.clone();
            }
            // the new handle goes into the memo before the contents are
            // copied, so that cycles resolve to the new handle
            let new = Rc::new(RefCell::new(TableData::new()));
            memo.insert(ptr, TypeValue::Table(new.clone()));

            let data = t.borrow();
            let mut copied = TableData::new();
            for (key, prop) in &data.props {
                copied.props.insert(key.clone(), Property {
                    read: copy_opt(&prop.read, memo),
                    write: copy_opt(&prop.write, memo),
                });
            }
            copied.indexer = data.indexer.as_ref().map(|ix| Indexer {
                key: copy_rec(&ix.key, memo),
                read: copy_rec(&ix.read, memo),
                write: copy_rec(&ix.write, memo),
            });
            copied.metatable = copy_opt(&data.metatable, memo);
            *new.borrow_mut() = copied;
            TypeValue::Table(new)
        }

        TypeValue::Function(ref func) => {
            let ptr = Rc::as_ptr(func) as usize;
            if let Some(copied) = memo.get(&ptr) {
                return copied.clone();
            }
            let new = Rc::new(RefCell::new(FuncData::new()));
            memo.insert(ptr, TypeValue::Function(new.clone()));

            let data = func.borrow();
            let copy_seq = |seq: &TypeSeq, memo: &mut HashMap<usize, TypeValue>| TypeSeq {
                head: seq.head.iter().map(|v| copy_rec(v, memo)).collect(),
                tail: seq.tail.as_ref().map(|v| Box::new(copy_rec(v, memo))),
            };
            let copied = FuncData {
                params: copy_seq(&data.params, memo),
                returns: copy_seq(&data.returns, memo),
            };
            *new.borrow_mut() = copied;
            TypeValue::Function(new)
        }

        TypeValue::Negation(ref inner) =>
            TypeValue::Negation(Box::new(copy_rec(inner, memo))),
        TypeValue::Union(ref cs) =>
            TypeValue::Union(cs.iter().map(|c| copy_rec(c, memo)).collect()),
        TypeValue::Intersection(ref cs) =>
            TypeValue::Intersection(cs.iter().map(|c| copy_rec(c, memo)).collect()),

        // immutable, safe to share
        ref v => v.clone(),
    }
}

impl PartialEq for TypeValue {
    fn eq(&self, other: &TypeValue) -> bool {
        let mut visited = HashSet::new();
        eq_rec(self, other, &mut visited)
    }
}

impl Eq for TypeValue {}

fn eq_rec(a: &TypeValue, b: &TypeValue, visited: &mut HashSet<(usize, usize)>) -> bool {
    fn eq_opt(a: &Option<TypeValue>, b: &Option<TypeValue>,
              visited: &mut HashSet<(usize, usize)>) -> bool {
        match (a, b) {
            (&Some(ref a), &Some(ref b)) => eq_rec(a, b, visited),
            (&None, &None) => true,
            _ => false,
        }
    }

    fn eq_props(a: &BTreeMap<Key, Property>, b: &BTreeMap<Key, Property>,
                visited: &mut HashSet<(usize, usize)>) -> bool {
        a.len() == b.len() &&
        a.iter().zip(b.iter()).all(|((ka, pa), (kb, pb))| {
            ka == kb && eq_opt(&pa.read, &pb.read, visited) &&
                        eq_opt(&pa.write, &pb.write, visited)
        })
    }

    fn eq_indexer(a: &Option<Indexer>, b: &Option<Indexer>,
                  visited: &mut HashSet<(usize, usize)>) -> bool {
        match (a, b) {
            (&Some(ref a), &Some(ref b)) =>
                eq_rec(&a.key, &b.key, visited) && eq_rec(&a.read, &b.read, visited) &&
                eq_rec(&a.write, &b.write, visited),
            (&None, &None) => true,
            _ => false,
        }
    }

    fn eq_seq(a: &TypeSeq, b: &TypeSeq, visited: &mut HashSet<(usize, usize)>) -> bool {
        a.head.len() == b.head.len() &&
        a.head.iter().zip(b.head.iter()).all(|(a, b)| eq_rec(a, b, visited)) &&
        match (&a.tail, &b.tail) {
            (&Some(ref a), &Some(ref b)) => eq_rec(a, b, visited),
            (&None, &None) => true,
            _ => false,
        }
    }

    match (a, b) {
        (&TypeValue::Nil, &TypeValue::Nil) |
        (&TypeValue::Unknown, &TypeValue::Unknown) |
        (&TypeValue::Never, &TypeValue::Never) |
        (&TypeValue::Any, &TypeValue::Any) |
        (&TypeValue::Boolean, &TypeValue::Boolean) |
        (&TypeValue::Number, &TypeValue::Number) |
        (&TypeValue::String, &TypeValue::String) => true,

        (&TypeValue::Singleton(ref a), &TypeValue::Singleton(ref b)) => a == b,

        (&TypeValue::Negation(ref a), &TypeValue::Negation(ref b)) =>
            eq_rec(a, b, visited),

        (&TypeValue::Union(ref a), &TypeValue::Union(ref b)) |
        (&TypeValue::Intersection(ref a), &TypeValue::Intersection(ref b)) =>
            a.len() == b.len() &&
            a.iter().zip(b.iter()).all(|(a, b)| eq_rec(a, b, visited)),

        (&TypeValue::Table(ref a), &TypeValue::Table(ref b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let pair = (Rc::as_ptr(a) as usize, Rc::as_ptr(b) as usize);
            if !visited.insert(pair) {
                // equal unless a later divergence proves otherwise
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            eq_props(&a.props, &b.props, visited) &&
            eq_indexer(&a.indexer, &b.indexer, visited) &&
            eq_opt(&a.metatable, &b.metatable, visited)
        }

        (&TypeValue::Function(ref a), &TypeValue::Function(ref b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let pair = (Rc::as_ptr(a) as usize, Rc::as_ptr(b) as usize);
            if !visited.insert(pair) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            eq_seq(&a.params, &b.params, visited) && eq_seq(&a.returns, &b.returns, visited)
        }

        // nominal identity
        (&TypeValue::Class(ref a), &TypeValue::Class(ref b)) => a.id == b.id,

        (_, _) => false,
    }
}

// the leaf-level subtype relation used by the `has*` queries.
// `other` may be a union (any component may match) or
// an intersection (every component must match).
fn leaf_subtype_of(leaf: &TypeValue, other: &TypeValue) -> bool {
    match *other {
        TypeValue::Any | TypeValue::Unknown => true,
        TypeValue::Union(ref cs) => cs.iter().any(|c| leaf_subtype_of(leaf, c)),
        TypeValue::Intersection(ref cs) => cs.iter().all(|c| leaf_subtype_of(leaf, c)),
        _ => {
            if leaf == other {
                return true;
            }
            match *leaf {
                TypeValue::Never => true,
                TypeValue::Singleton(Key::Str(_)) => *other == TypeValue::String,
                TypeValue::Singleton(Key::Bool(_)) => *other == TypeValue::Boolean,
                TypeValue::Table(ref t) => metatable_chain_contains(t, other),
                TypeValue::Class(ref c) => class_chain_contains(c, other),
                _ => false,
            }
        }
    }
}

// walks the metatable chain of `t` looking for `other`.
// chains are user-constructible and can be cyclic, hence the visited set.
fn metatable_chain_contains(t: &TableRef, other: &TypeValue) -> bool {
    let mut visited = HashSet::new();
    visited.insert(Rc::as_ptr(t) as usize);

    let mut meta = t.borrow().metatable.clone();
    while let Some(m) = meta {
        if m == *other {
            return true;
        }
        match m {
            TypeValue::Table(ref mt) => {
                if !visited.insert(Rc::as_ptr(mt) as usize) {
                    return false;
                }
                meta = mt.borrow().metatable.clone();
            }
            _ => return false,
        }
    }
    false
}

// walks the parent chain (and per-class metatables) of `c` looking for `other`.
fn class_chain_contains(c: &Rc<ClassData>, other: &TypeValue) -> bool {
    let mut visited = HashSet::new();
    let mut cur = c.clone();
    loop {
        if !visited.insert(cur.id) {
            return false;
        }
        if let Some(ref m) = cur.metatable {
            if *m == *other {
                return true;
            }
        }
        let next = match cur.parent {
            Some(TypeValue::Class(ref p)) => {
                if let TypeValue::Class(ref o) = *other {
                    if o.id == p.id {
                        return true;
                    }
                }
                Some(p.clone())
            }
            _ => None,
        };
        match next {
            Some(next) => cur = next,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_invariant() {
        assert_eq!(TypeValue::union_of(vec![]),
                   Err(ConstructionError::InvalidArity { given: 0 }));
        assert_eq!(TypeValue::union_of(vec![TypeValue::Number]),
                   Err(ConstructionError::InvalidArity { given: 1 }));
        assert_eq!(TypeValue::intersection_of(vec![TypeValue::Number]),
                   Err(ConstructionError::InvalidArity { given: 1 }));

        let u = TypeValue::union_of(vec![TypeValue::Number, TypeValue::String]).unwrap();
        assert_eq!(u.tag(), Tag::Union);

        // syntactic duplicates collapse, possibly to a non-union
        let u = TypeValue::union_of(vec![TypeValue::String, TypeValue::String]).unwrap();
        assert_eq!(u, TypeValue::String);
    }

    #[test]
    fn test_negation_restriction() {
        let t = TypeValue::new_table();
        let f = TypeValue::new_function(TypeSeq::empty(), TypeSeq::empty());
        assert_eq!(TypeValue::negation_of(t),
                   Err(ConstructionError::UnsupportedNegation { tag: Tag::Table }));
        assert_eq!(TypeValue::negation_of(f),
                   Err(ConstructionError::UnsupportedNegation { tag: Tag::Function }));

        let n = TypeValue::negation_of(TypeValue::str_singleton("meow")).unwrap();
        assert_eq!(n.tag(), Tag::Negation);
        let u = TypeValue::union_of(vec![TypeValue::Number, TypeValue::String]).unwrap();
        assert_eq!(TypeValue::negation_of(u).map(|v| v.tag()), Ok(Tag::Negation));

        // a union containing a table is not testable either
        let u = TypeValue::union_of(vec![TypeValue::Number, TypeValue::new_table()]).unwrap();
        assert_eq!(TypeValue::negation_of(u),
                   Err(ConstructionError::UnsupportedNegation { tag: Tag::Union }));
    }

    #[test]
    fn test_syntactic_equality() {
        let tf = TypeValue::union_of(vec![TypeValue::bool_singleton(true),
                                          TypeValue::bool_singleton(false)]).unwrap();
        assert_ne!(tf, TypeValue::Boolean);
        assert_eq!(tf.clone(), tf);

        // unions are ordered
        let ab = TypeValue::union_of(vec![TypeValue::Number, TypeValue::String]).unwrap();
        let ba = TypeValue::union_of(vec![TypeValue::String, TypeValue::Number]).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_table_aliasing_and_copy() {
        let t1 = TypeValue::new_table();
        let t2 = t1.clone(); // same handle
        t1.table().unwrap().borrow_mut().props.insert(
            Key::Str("x".into()),
            Property { read: Some(TypeValue::Number), write: Some(TypeValue::Number) });
        {
            let data = t2.table().unwrap().borrow();
            let prop = data.props.get(&Key::Str("x".into())).unwrap();
            assert_eq!(prop.read, Some(TypeValue::Number));
        }

        let t3 = t1.copy();
        t1.table().unwrap().borrow_mut().props.insert(
            Key::Str("y".into()),
            Property { read: Some(TypeValue::String), write: None });
        assert!(t3.table().unwrap().borrow().props.get(&Key::Str("y".into())).is_none());
    }

    #[test]
    fn test_copy_preserves_cycles() {
        let t = TypeValue::new_table();
        t.table().unwrap().borrow_mut().metatable = Some(t.clone());
        let c = t.copy();
        let meta = c.table().unwrap().borrow().metatable.clone().unwrap();
        assert!(Rc::ptr_eq(meta.table().unwrap(), c.table().unwrap()));
        assert!(!Rc::ptr_eq(meta.table().unwrap(), t.table().unwrap()));
    }

    #[test]
    fn test_cyclic_equality_terminates() {
        let mk = || {
            let t = TypeValue::new_table();
            t.table().unwrap().borrow_mut().metatable = Some(t.clone());
            t
        };
        let (a, b) = (mk(), mk());
        assert_eq!(a, b);
    }

    #[test]
    fn test_subtype_queries() {
        let t = TypeValue::union_of(vec![TypeValue::Number,
                                         TypeValue::str_singleton("mrrp"),
                                         TypeValue::String]).unwrap();
        assert!(t.has_subtype_of(&TypeValue::String));
        assert!(!t.has_only_subtype_of(&TypeValue::String));
        assert!(t.has_subtype(Tag::Number));
        assert!(!t.has_only_subtype(Tag::Singleton));

        let u = TypeValue::union_of(vec![TypeValue::str_singleton("purr"),
                                         TypeValue::str_singleton("meow")]).unwrap();
        assert!(u.has_only_subtype_of(&TypeValue::String));
        assert!(u.has_only_subtype(Tag::Singleton));
    }

    #[test]
    fn test_metatable_chain_subtype() {
        let base = TypeValue::new_table();
        let mid = TypeValue::new_table();
        let leaf = TypeValue::new_table();
        mid.table().unwrap().borrow_mut().metatable = Some(base.clone());
        leaf.table().unwrap().borrow_mut().metatable = Some(mid.clone());

        assert!(leaf.has_subtype_of(&base));
        assert!(leaf.has_subtype_of(&mid));
        assert!(!base.has_subtype_of(&leaf));

        // a cyclic chain must terminate
        base.table().unwrap().borrow_mut().metatable = Some(leaf.clone());
        assert!(!leaf.has_subtype_of(&TypeValue::new_table()));
    }
}
