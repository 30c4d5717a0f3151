//! Type representations.

pub use self::flags::Flags;
pub use self::value::{Tag, Key, Property, Indexer, TypeSeq, TypeValue};
pub use self::value::{TableRef, TableData, FuncRef, FuncData, ClassData};
pub use self::value::ConstructionError;
pub use self::host::{HostTy, HostTable, HostFunc, HostSeq, HostProp, HostIndexer, ClassId};
pub use self::serde::{Serializer, deserialize_result, to_host, SerdeError};

pub mod flags;
pub mod value;
pub mod host;
pub mod display;
pub mod serde;
