//! genc-sync: encrypted object/ref stores and the fetch/push engine

pub mod engine;
pub mod objects;
pub mod refs;

pub use engine::{fetch, init, push, InitParams, KeyMaterial, SyncContext, SyncOptions};
pub use objects::{export_object, has_object, import_all_objects, import_object};
pub use refs::refs_to_git_string;
