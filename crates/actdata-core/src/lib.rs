//! Document model for actdata.
//!
//! A [`Document`] groups typed [`Node`]s into Partitions; each Node owns a
//! fixed, schema-declared sequence of [`Parameter`]s. Everything is stored
//! in a [`LabelStore`] so that every mutation can be recorded, committed,
//! aborted, undone and redone by the transaction engine.
//!
//! # Modules
//!
//! - [`label`]: the label tree, attributes, scopes and deltas
//! - [`schema`]: Node type schemas and the explicit type registry
//! - [`value`]: Parameter kinds and values
//! - [`document`]: the document, its write API and transaction commands
//! - [`node`], [`parameter`], [`partition`]: read-only views
//! - [`dto`]: plain transfer objects for Parameters
//! - [`hierarchy`]: parent/child links between Nodes and unique names
//! - [`clipboard`]: copying Node subtrees and pasting them elsewhere
//! - [`logbook`]: the modification log driving re-execution
//! - [`transaction`]: undo/redo stacks
//! - [`function`]: Tree-Function invocation records

pub mod clipboard;
pub mod config;
pub mod document;
pub mod dto;
pub mod error;
pub mod function;
pub mod hierarchy;
pub mod id;
pub mod label;
pub mod logbook;
pub mod node;
pub mod parameter;
pub mod partition;
pub mod schema;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use clipboard::{CopiedNode, NodeClipboard, ReferenceFilter};
pub use config::DocumentConfig;
pub use document::Document;
pub use dto::{ParameterDto, ParameterGid};
pub use error::{CoreError, LabelError, TransactionError};
pub use function::{TreeFunctionBinding, TreeFunctionPriority};
pub use hierarchy::unique_name;
pub use id::{LabelId, NodeId, ParameterId};
pub use label::{AttrValue, Entry, LabelStore};
pub use logbook::LogBook;
pub use node::{Node, WellFormedReport};
pub use parameter::{ModificationKind, Parameter};
pub use partition::Partition;
pub use schema::{NodeRegistry, NodeSchema, ParamSlot};
pub use transaction::{TxParameter, TxResult};
pub use value::{ParamKind, ParamValue};
