//! Strike Store
//!
//! Durable backing for the two independent strike datasets (runtime
//! configuration and the warning ledger). Each dataset is one JSON document:
//!
//! ```text
//! load at startup ──► in-memory state ──► mutation ──► write-through ──► rename into place
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use strike_store::JsonDocument;
//! use std::collections::BTreeMap;
//!
//! # async fn example() -> Result<(), strike_store::StoreError> {
//! let doc = JsonDocument::<BTreeMap<String, u32>>::new("./counts.json");
//! let mut counts = doc.load().await?;
//! counts.insert("a".into(), 1);
//! doc.write(&counts).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod document;
pub mod error;

pub use document::JsonDocument;
pub use error::StoreError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
