pub mod config;
pub mod error;
pub mod types;

pub use error::{GencError, GencResult};
pub use types::{
    ObjectId, PushOutcome, PushStatus, RefPair, RefUpdate, RefValue, RemoteUrl, EMPTY_TREE_ID,
    ENCRYPTED_URL_PREFIX,
};
