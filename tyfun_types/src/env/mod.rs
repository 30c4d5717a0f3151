//! The class registry.
//!
//! Classes are nominal types the host registers before analysis starts.
//! The sandbox sees them read-only; parent links always point to an
//! already-registered class, so the parent chain is acyclic by construction.

use vec_map::VecMap;

use ty::{Key, ClassId, HostProp, HostIndexer, HostTy};

pub struct ClassDef {
    pub name: String,
    pub props: Vec<(Key, HostProp)>,
    pub parent: Option<ClassId>,
    pub metatable: Option<HostTy>,
    pub indexer: Option<HostIndexer>,
}

pub struct ClassRegistry {
    classes: VecMap<ClassDef>,
}

impl ClassRegistry {
    pub fn new() -> ClassRegistry {
        ClassRegistry { classes: VecMap::new() }
    }

    /// Registers a class; the parent, if any, must be registered already.
    pub fn register(&mut self, mut def: ClassDef) -> ClassId {
        if let Some(parent) = def.parent {
            assert!(self.classes.contains_key(parent.0 as usize),
                    "parent class is not registered");
        }
        def.props.sort_by(|&(ref a, _), &(ref b, _)| a.cmp(b));
        let id = ClassId(self.classes.len() as u32);
        self.classes.insert(id.0 as usize, def);
        id
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

#[test]
fn test_registry_parent_chain() {
    let mut reg = ClassRegistry::new();
    let base = reg.register(ClassDef {
        name: "Base".into(), props: Vec::new(), parent: None,
        metatable: None, indexer: None,
    });
    let derived = reg.register(ClassDef {
        name: "Derived".into(), props: Vec::new(), parent: Some(base),
        metatable: None, indexer: None,
    });
    assert_eq!(reg.get(derived).unwrap().parent, Some(base));
    assert_eq!(reg.get(base).unwrap().parent, None);
}
