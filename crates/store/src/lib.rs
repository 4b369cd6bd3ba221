//! # Store
//!
//! Filesystem-backed store for types and objects.
//!
//! The on-disk layout is the compatibility contract with the shell scripts
//! that implement types: every object field is one file or one directory of
//! files, read fresh on every access. Only immutable type data is cached.
//!
//! ## Core Concepts
//!
//! - **Type**: immutable schema loaded from a type directory
//! - **TypeRegistry**: load-once cache of types, owned by a run
//! - **Object**: handle to one instance of a type, addressed by name
//! - **ObjectStore**: enumeration and lookup of the objects of one run
//! - **ObjectLock**: exclusive per-object lock for concurrent writers
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use store::{ObjectStore, TypeRegistry};
//!
//! let types = Arc::new(TypeRegistry::new("/srv/conf/type"));
//! let store = ObjectStore::new("/srv/out/object", ".cdist-01H...", types);
//!
//! let motd = store.create_object("__file", "etc/motd")?;
//! motd.add_requirement("__package/figlet")?;
//! for object in store.list_objects()? {
//!     println!("{} is {}", object.name(), object.state()?);
//! }
//! ```

pub mod error;
pub mod fsprop;
mod lock;
pub mod object;
mod registry;
mod store;
pub mod typedef;

pub use error::{Error, Result};
pub use lock::ObjectLock;
pub use object::{
    join_name, sanitise_object_id, split_name, validate_object_id, Object, ObjectState,
    ParamValue, Parameters,
};
pub use registry::TypeRegistry;
pub use store::ObjectStore;
pub use typedef::Type;
