//! Conversion between host types and type values at the reduction boundary.
//!
//! Serialization happens once per reduction per argument; the resulting
//! type values are owned by that reduction alone. Repeated serialization of
//! the same host type yields equal (never identical) values. Deserialization
//! re-validates every invariant, since the sandbox can hand back values
//! assembled around the guarded constructors, and rejects cyclic results
//! (host types are strictly acyclic).

use std::fmt;
use std::rc::Rc;
use std::collections::{BTreeMap, HashSet};

use vec_map::VecMap;

use env::ClassRegistry;
use super::value::{TypeValue, TypeSeq, Property, Indexer, ClassData, ConstructionError};
use super::host::{HostTy, HostTable, HostFunc, HostSeq, HostProp, HostIndexer, ClassId};

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SerdeError {
    /// The reduction did not return exactly one value.
    Arity { given: usize },

    /// The returned type contains a cyclic table or function.
    Cyclic,

    /// A component of the returned type violates a construction invariant.
    Malformed(ConstructionError),

    /// An error placeholder type was used as a reduction argument.
    ErrorType,

    /// A class value refers to an unregistered class.
    UnknownClass(ClassId),
}

impl fmt::Display for SerdeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SerdeError::Arity { given } =>
                write!(f, "expected exactly one returned type, got {}", given),
            SerdeError::Cyclic =>
                write!(f, "the returned type is cyclic"),
            SerdeError::Malformed(ref e) =>
                write!(f, "malformed type in the result: {}", e),
            SerdeError::ErrorType =>
                write!(f, "an error type cannot be passed to a type function"),
            SerdeError::UnknownClass(id) =>
                write!(f, "unregistered class #{}", id.0),
        }
    }
}

/// Serializes host types into type values for one reduction.
///
/// The serializer caches materialized classes, so the same class serializes
/// to the identical (`Rc`-shared) value within a reduction.
pub struct Serializer<'a> {
    classes: &'a ClassRegistry,
    cache: VecMap<Rc<ClassData>>,
}

impl<'a> Serializer<'a> {
    pub fn new(classes: &'a ClassRegistry) -> Serializer<'a> {
        Serializer { classes: classes, cache: VecMap::new() }
    }

    pub fn serialize(&mut self, ty: &HostTy) -> Result<TypeValue, SerdeError> {
        let v = match *ty {
            HostTy::Nil => TypeValue::Nil,
            HostTy::Unknown => TypeValue::Unknown,
            HostTy::Never => TypeValue::Never,
            HostTy::Any => TypeValue::Any,
            HostTy::Boolean => TypeValue::Boolean,
            HostTy::Number => TypeValue::Number,
            HostTy::String => TypeValue::String,

            HostTy::BoolSingleton(v) => TypeValue::bool_singleton(v),
            HostTy::StrSingleton(ref s) => TypeValue::str_singleton(&s[..]),

            HostTy::Negation(ref inner) => {
                let inner = self.serialize(inner)?;
                TypeValue::negation_of(inner).map_err(SerdeError::Malformed)?
            }

            HostTy::Union(ref cs) => {
                let cs = self.serialize_all(cs)?;
                TypeValue::union_of(cs).map_err(SerdeError::Malformed)?
            }

            HostTy::Intersection(ref cs) => {
                let cs = self.serialize_all(cs)?;
                TypeValue::intersection_of(cs).map_err(SerdeError::Malformed)?
            }

            HostTy::Table(ref tab) => {
                let v = TypeValue::new_table();
                {
                    let handle = v.table().expect("new_table did not make a table");
                    let mut data = handle.borrow_mut();
                    for &(ref key, ref prop) in &tab.props {
                        data.props.insert(key.clone(), self.serialize_prop(prop)?);
                    }
                    data.indexer = match tab.indexer {
                        Some(ref ix) => Some(self.serialize_indexer(ix)?),
                        None => None,
                    };
                    data.metatable = match tab.metatable {
                        Some(ref m) => Some(self.serialize(m)?),
                        None => None,
                    };
                }
                v
            }

            HostTy::Function(ref func) => {
                let params = self.serialize_seq(&func.params)?;
                let returns = self.serialize_seq(&func.returns)?;
                TypeValue::new_function(params, returns)
            }

            HostTy::Class(id) => TypeValue::Class(self.class_value(id)?),

            HostTy::Error => return Err(SerdeError::ErrorType),
        };
        Ok(v)
    }

    fn serialize_all(&mut self, tys: &[HostTy]) -> Result<Vec<TypeValue>, SerdeError> {
        tys.iter().map(|ty| self.serialize(ty)).collect()
    }

    fn serialize_prop(&mut self, prop: &HostProp) -> Result<Property, SerdeError> {
        Ok(Property {
            read: match prop.read {
                Some(ref ty) => Some(self.serialize(ty)?),
                None => None,
            },
            write: match prop.write {
                Some(ref ty) => Some(self.serialize(ty)?),
                None => None,
            },
        })
    }

    fn serialize_indexer(&mut self, ix: &HostIndexer) -> Result<Indexer, SerdeError> {
        Ok(Indexer {
            key: self.serialize(&ix.key)?,
            read: self.serialize(&ix.read)?,
            write: self.serialize(&ix.write)?,
        })
    }

    fn serialize_seq(&mut self, seq: &HostSeq) -> Result<TypeSeq, SerdeError> {
        Ok(TypeSeq {
            head: self.serialize_all(&seq.head)?,
            tail: match seq.tail {
                Some(ref ty) => Some(Box::new(self.serialize(ty)?)),
                None => None,
            },
        })
    }

    // materializes a registered class (and, recursively, its parent chain)
    fn class_value(&mut self, id: ClassId) -> Result<Rc<ClassData>, SerdeError> {
        if let Some(cached) = self.cache.get(id.0 as usize) {
            return Ok(cached.clone());
        }

        // clone out of the registry first; the parent chain is materialized
        // recursively and also borrows `self`
        let (name, parent, props, metatable, indexer) = {
            let def = self.classes.get(id).ok_or(SerdeError::UnknownClass(id))?;
            (def.name.clone(), def.parent, def.props.clone(),
             def.metatable.clone(), def.indexer.clone())
        };

        let parent = match parent {
            Some(pid) => Some(TypeValue::Class(self.class_value(pid)?)),
            None => None,
        };
        let mut prop_map = BTreeMap::new();
        for (key, prop) in props {
            prop_map.insert(key, self.serialize_prop(&prop)?);
        }
        let metatable = match metatable {
            Some(ref m) => Some(self.serialize(m)?),
            None => None,
        };
        let indexer = match indexer {
            Some(ref ix) => Some(self.serialize_indexer(ix)?),
            None => None,
        };

        let data = Rc::new(ClassData {
            id: id,
            name: name,
            props: prop_map,
            parent: parent,
            metatable: metatable,
            indexer: indexer,
        });
        self.cache.insert(id.0 as usize, data.clone());
        Ok(data)
    }
}

/// Deserializes the values returned by a reduction into a single host type.
pub fn deserialize_result(values: &[TypeValue]) -> Result<HostTy, SerdeError> {
    if values.len() != 1 {
        return Err(SerdeError::Arity { given: values.len() });
    }
    let ty = to_host(&values[0])?;
    debug!("deserialized result: {:?}", ty);
    Ok(ty)
}

/// Converts a single type value into a host type, re-validating invariants.
/// This is also the copy-out used when a type value crosses into a nested
/// reduction as an argument.
pub fn to_host(v: &TypeValue) -> Result<HostTy, SerdeError> {
    let mut active = HashSet::new();
    deserialize(v, &mut active)
}

fn deserialize(v: &TypeValue, active: &mut HashSet<usize>) -> Result<HostTy, SerdeError> {
    let ty = match *v {
        TypeValue::Nil => HostTy::Nil,
        TypeValue::Unknown => HostTy::Unknown,
        TypeValue::Never => HostTy::Never,
        TypeValue::Any => HostTy::Any,
        TypeValue::Boolean => HostTy::Boolean,
        TypeValue::Number => HostTy::Number,
        TypeValue::String => HostTy::String,

        TypeValue::Singleton(super::value::Key::Bool(v)) => HostTy::BoolSingleton(v),
        TypeValue::Singleton(super::value::Key::Str(ref s)) => HostTy::str_singleton(&s[..]),

        TypeValue::Negation(ref inner) => {
            if !inner.flags().is_testable() {
                let e = ConstructionError::UnsupportedNegation { tag: inner.tag() };
                return Err(SerdeError::Malformed(e));
            }
            HostTy::Negation(Box::new(deserialize(inner, active)?))
        }

        TypeValue::Union(ref cs) => {
            HostTy::Union(deserialize_components(cs, active)?)
        }

        TypeValue::Intersection(ref cs) => {
            HostTy::Intersection(deserialize_components(cs, active)?)
        }

        TypeValue::Table(ref t) => {
            let ptr = Rc::as_ptr(t) as usize;
            if !active.insert(ptr) {
                return Err(SerdeError::Cyclic);
            }
            let data = t.borrow();
            let mut tab = HostTable::new();
            // BTreeMap iteration is already in key order
            for (key, prop) in &data.props {
                tab.props.push((key.clone(), deserialize_prop(prop, active)?));
            }
            tab.indexer = match data.indexer {
                Some(ref ix) => Some(Box::new(HostIndexer {
                    key: deserialize(&ix.key, active)?,
                    read: deserialize(&ix.read, active)?,
                    write: deserialize(&ix.write, active)?,
                })),
                None => None,
            };
            tab.metatable = match data.metatable {
                Some(ref m) => Some(Box::new(deserialize(m, active)?)),
                None => None,
            };
            active.remove(&ptr);
            HostTy::Table(Box::new(tab))
        }

        TypeValue::Function(ref func) => {
            let ptr = Rc::as_ptr(func) as usize;
            if !active.insert(ptr) {
                return Err(SerdeError::Cyclic);
            }
            let data = func.borrow();
            let host = HostFunc {
                params: deserialize_seq(&data.params, active)?,
                returns: deserialize_seq(&data.returns, active)?,
            };
            active.remove(&ptr);
            HostTy::Function(Box::new(host))
        }

        TypeValue::Class(ref c) => HostTy::Class(c.id),
    };
    Ok(ty)
}

fn deserialize_components(cs: &[TypeValue],
                          active: &mut HashSet<usize>) -> Result<Vec<HostTy>, SerdeError> {
    if cs.len() < 2 {
        // can only happen for values assembled around the guarded constructors
        let e = ConstructionError::InvalidArity { given: cs.len() };
        return Err(SerdeError::Malformed(e));
    }
    cs.iter().map(|c| deserialize(c, active)).collect()
}

fn deserialize_prop(prop: &Property, active: &mut HashSet<usize>)
        -> Result<HostProp, SerdeError> {
    Ok(HostProp {
        read: match prop.read {
            Some(ref v) => Some(deserialize(v, active)?),
            None => None,
        },
        write: match prop.write {
            Some(ref v) => Some(deserialize(v, active)?),
            None => None,
        },
    })
}

fn deserialize_seq(seq: &TypeSeq, active: &mut HashSet<usize>)
        -> Result<HostSeq, SerdeError> {
    Ok(HostSeq {
        head: seq.head.iter().map(|v| deserialize(v, active)).collect::<Result<_, _>>()?,
        tail: match seq.tail {
            Some(ref v) => Some(Box::new(deserialize(v, active)?)),
            None => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use env::{ClassDef, ClassRegistry};
    use ty::{TypeValue, Key, HostTy, HostTable, HostProp, SerdeError};
    use super::{Serializer, deserialize_result};

    fn person_ty() -> HostTy {
        let mut tab = HostTable::new();
        tab.set_prop(Key::Str("name".into()),
                     HostProp { read: Some(HostTy::String), write: Some(HostTy::String) });
        tab.set_prop(Key::Str("age".into()),
                     HostProp { read: Some(HostTy::Number), write: Some(HostTy::Number) });
        HostTy::Table(Box::new(tab))
    }

    #[test]
    fn test_round_trip() {
        let registry = ClassRegistry::new();
        let mut ser = Serializer::new(&registry);

        let tys = [
            HostTy::Nil,
            HostTy::Union(vec![HostTy::Number, HostTy::str_singleton("mrrp"),
                               HostTy::String]),
            HostTy::Negation(Box::new(HostTy::BoolSingleton(true))),
            person_ty(),
        ];
        for ty in &tys {
            let v = ser.serialize(ty).unwrap();
            assert_eq!(deserialize_result(&[v]).unwrap(), *ty);
        }
    }

    #[test]
    fn test_serialize_is_equal_not_identical() {
        let registry = ClassRegistry::new();
        let mut ser = Serializer::new(&registry);
        let ty = person_ty();
        let a = ser.serialize(&ty).unwrap();
        let b = ser.serialize(&ty).unwrap();
        assert_eq!(a, b);
        assert!(!Rc::ptr_eq(a.table().unwrap(), b.table().unwrap()));
    }

    #[test]
    fn test_result_arity() {
        assert_eq!(deserialize_result(&[]), Err(SerdeError::Arity { given: 0 }));
        let vs = [TypeValue::Nil, TypeValue::Nil];
        assert_eq!(deserialize_result(&vs), Err(SerdeError::Arity { given: 2 }));
    }

    #[test]
    fn test_cyclic_result_rejected() {
        let t = TypeValue::new_table();
        t.table().unwrap().borrow_mut().metatable = Some(t.clone());
        assert_eq!(deserialize_result(&[t]), Err(SerdeError::Cyclic));
    }

    #[test]
    fn test_error_type_does_not_serialize() {
        let registry = ClassRegistry::new();
        let mut ser = Serializer::new(&registry);
        assert_eq!(ser.serialize(&HostTy::Error), Err(SerdeError::ErrorType));
        let inside = HostTy::Union(vec![HostTy::Number, HostTy::Error]);
        assert_eq!(ser.serialize(&inside), Err(SerdeError::ErrorType));
    }

    #[test]
    fn test_class_serialization() {
        let mut registry = ClassRegistry::new();
        let base = registry.register(ClassDef {
            name: "Base".into(), props: Vec::new(), parent: None,
            metatable: None, indexer: None,
        });
        let derived = registry.register(ClassDef {
            name: "Derived".into(), props: Vec::new(), parent: Some(base),
            metatable: None, indexer: None,
        });

        let mut ser = Serializer::new(&registry);
        let b = ser.serialize(&HostTy::Class(base)).unwrap();
        let d = ser.serialize(&HostTy::Class(derived)).unwrap();

        // the derived class is a subtype of its parent, not vice versa
        assert!(d.has_subtype_of(&b));
        assert!(!b.has_subtype_of(&d));

        // same class materializes to the identical value within a reduction
        let b2 = ser.serialize(&HostTy::Class(base)).unwrap();
        assert!(Rc::ptr_eq(b.class().unwrap(), b2.class().unwrap()));

        assert_eq!(deserialize_result(&[d]).unwrap(), HostTy::Class(derived));
    }
}
