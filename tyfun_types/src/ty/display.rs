//! Human-readable rendering of host types.
//!
//! Class names live in the registry, so a type is rendered through a
//! short-lived wrapper borrowing both.

use std::fmt;

use env::ClassRegistry;
use super::value::Key;
use super::host::{HostTy, HostSeq};

impl HostTy {
    pub fn display<'a>(&'a self, classes: &'a ClassRegistry) -> HostTyDisplay<'a> {
        HostTyDisplay { ty: self, classes: classes }
    }
}

pub struct HostTyDisplay<'a> {
    ty: &'a HostTy,
    classes: &'a ClassRegistry,
}

impl<'a> fmt::Display for HostTyDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_prec(self.ty, Prec::Union, f)
    }
}

#[derive(Copy, Clone, PartialEq, PartialOrd)]
enum Prec {
    Union,
    Intersection,
    Atom,
}

impl<'a> HostTyDisplay<'a> {
    fn fmt_prec(&self, ty: &HostTy, prec: Prec, f: &mut fmt::Formatter) -> fmt::Result {
        match *ty {
            HostTy::Nil => write!(f, "nil"),
            HostTy::Unknown => write!(f, "unknown"),
            HostTy::Never => write!(f, "never"),
            HostTy::Any => write!(f, "any"),
            HostTy::Boolean => write!(f, "boolean"),
            HostTy::Number => write!(f, "number"),
            HostTy::String => write!(f, "string"),
            HostTy::BoolSingleton(v) => write!(f, "{}", v),
            HostTy::StrSingleton(ref s) => write!(f, "{:?}", s),

            HostTy::Negation(ref inner) => {
                write!(f, "~")?;
                self.fmt_prec(inner, Prec::Atom, f)
            }

            HostTy::Union(ref cs) => {
                let paren = prec > Prec::Union;
                if paren { write!(f, "(")?; }
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 { write!(f, " | ")?; }
                    self.fmt_prec(c, Prec::Intersection, f)?;
                }
                if paren { write!(f, ")")?; }
                Ok(())
            }

            HostTy::Intersection(ref cs) => {
                let paren = prec > Prec::Intersection;
                if paren { write!(f, "(")?; }
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 { write!(f, " & ")?; }
                    self.fmt_prec(c, Prec::Atom, f)?;
                }
                if paren { write!(f, ")")?; }
                Ok(())
            }

            HostTy::Table(ref tab) => {
                write!(f, "{{")?;
                let mut first = true;
                for &(ref key, ref prop) in &tab.props {
                    if !first { write!(f, ", ")?; }
                    first = false;
                    match *key {
                        Key::Str(ref s) if is_name(s) => write!(f, "{}", s)?,
                        Key::Str(ref s) => write!(f, "[{:?}]", s)?,
                        Key::Bool(v) => write!(f, "[{}]", v)?,
                    }
                    // a write-only property still renders its sole type
                    let ty = prop.read.as_ref().or(prop.write.as_ref());
                    match ty {
                        Some(ty) => {
                            write!(f, ": ")?;
                            self.fmt_prec(ty, Prec::Union, f)?;
                        }
                        None => write!(f, ": never")?,
                    }
                }
                if let Some(ref ix) = tab.indexer {
                    if !first { write!(f, ", ")?; }
                    write!(f, "[")?;
                    self.fmt_prec(&ix.key, Prec::Union, f)?;
                    write!(f, "]: ")?;
                    self.fmt_prec(&ix.read, Prec::Union, f)?;
                }
                write!(f, "}}")
            }

            HostTy::Function(ref func) => {
                self.fmt_seq(&func.params, f)?;
                write!(f, " -> ")?;
                self.fmt_seq(&func.returns, f)
            }

            HostTy::Class(id) => {
                match self.classes.get(id) {
                    Some(def) => write!(f, "{}", def.name),
                    None => write!(f, "<class #{}>", id.0),
                }
            }

            HostTy::Error => write!(f, "<error>"),
        }
    }

    fn fmt_seq(&self, seq: &HostSeq, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in seq.head.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            self.fmt_prec(ty, Prec::Union, f)?;
        }
        if let Some(ref tail) = seq.tail {
            if !seq.head.is_empty() { write!(f, ", ")?; }
            self.fmt_prec(tail, Prec::Union, f)?;
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use env::{ClassDef, ClassRegistry};
    use ty::{Key, HostTy, HostTable, HostFunc, HostSeq, HostProp, HostIndexer};

    fn fmt(ty: &HostTy) -> String {
        let registry = ClassRegistry::new();
        format!("{}", ty.display(&registry))
    }

    #[test]
    fn test_display_simple() {
        assert_eq!(fmt(&HostTy::Number), "number");
        assert_eq!(fmt(&HostTy::BoolSingleton(false)), "false");
        assert_eq!(fmt(&HostTy::str_singleton("mrrp")), "\"mrrp\"");
        assert_eq!(fmt(&HostTy::Negation(Box::new(HostTy::Nil))), "~nil");
    }

    #[test]
    fn test_display_compound() {
        let u = HostTy::Union(vec![HostTy::Number, HostTy::str_singleton("mrrp"),
                                   HostTy::String]);
        assert_eq!(fmt(&u), "number | \"mrrp\" | string");

        let i = HostTy::Intersection(vec![HostTy::Union(vec![HostTy::Number,
                                                             HostTy::String]),
                                          HostTy::Any]);
        assert_eq!(fmt(&i), "(number | string) & any");

        let n = HostTy::Negation(Box::new(HostTy::Union(vec![HostTy::Nil,
                                                             HostTy::Boolean])));
        assert_eq!(fmt(&n), "~(nil | boolean)");
    }

    #[test]
    fn test_display_table_and_func() {
        let mut tab = HostTable::new();
        tab.set_prop(Key::Str("name".into()),
                     HostProp { read: Some(HostTy::String), write: Some(HostTy::String) });
        tab.set_prop(Key::Str("age".into()),
                     HostProp { read: Some(HostTy::Number), write: Some(HostTy::Number) });
        assert_eq!(fmt(&HostTy::Table(Box::new(tab))),
                   "{age: number, name: string}");

        let mut ixtab = HostTable::new();
        ixtab.indexer = Some(Box::new(HostIndexer {
            key: HostTy::Number, read: HostTy::String, write: HostTy::String,
        }));
        assert_eq!(fmt(&HostTy::Table(Box::new(ixtab))), "{[number]: string}");

        let func = HostFunc {
            params: HostSeq { head: vec![HostTy::Number],
                              tail: Some(Box::new(HostTy::String)) },
            returns: HostSeq { head: vec![HostTy::Boolean], tail: None },
        };
        assert_eq!(fmt(&HostTy::Function(Box::new(func))),
                   "(number, string...) -> (boolean)");
    }

    #[test]
    fn test_display_class() {
        let mut registry = ClassRegistry::new();
        let id = registry.register(ClassDef {
            name: "Greeter".into(), props: Vec::new(), parent: None,
            metatable: None, indexer: None,
        });
        assert_eq!(format!("{}", HostTy::Class(id).display(&registry)), "Greeter");
    }
}
