//! Persistence glue and schema-version conversion for actdata documents.
//!
//! # Modules
//!
//! - [`snapshot`]: DTO snapshots of whole documents
//! - [`hash`]: blake3 content fingerprints
//! - [`conversion`]: version steps and the [`Converter`]
//! - [`context`]: Parameter insert/update/delete with reference rewriting
//! - [`loader`]: JSON snapshot files in and out

pub mod context;
pub mod conversion;
pub mod error;
pub mod hash;
pub mod loader;
pub mod snapshot;

pub use context::ConversionContext;
pub use conversion::{ConversionRoutine, ConversionTuple, Converter, VersionDelta};
pub use error::StorageError;
pub use hash::{fingerprint, fingerprint_snapshot};
pub use loader::Loader;
pub use snapshot::{DocumentSnapshot, NodeSnapshot};
