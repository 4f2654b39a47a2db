//! Home Assistant Storage
//!
//! JSON persistence helpers shared by the config entry registry and the
//! integrations:
//!
//! - [`Storage`] - versioned files in the `.storage/` directory
//! - [`load_json`] / [`save_json`] - loose JSON files anywhere on disk
//!
//! All writes go to a sibling `.tmp` file first and are then renamed over
//! the target, so readers never observe a half-written file.

mod error;
mod json;
mod storage;

pub use error::{StorageError, StorageResult};
pub use json::{load_json, save_json};
pub use storage::{Storable, Storage, StorageFile};
