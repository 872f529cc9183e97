//! Offline, best-effort salvage of key-value records from damaged
//! bolt-format database files.
//!
//! The normal transactional layer refuses to open a file whose meta pages
//! are corrupted or truncated. This crate bypasses it entirely: it derives
//! the page size without trusting the file's own metadata ([`detect`]),
//! reads pages directly from byte offsets with self-consistency checks
//! ([`reader`]), and walks every page of the file in a fault-tolerant
//! linear scan ([`scan`]) that extracts leaf entries, filters them by an
//! expected key shape ([`classify`]), and forwards accepted records to a
//! sink. A [`build::StoreBuilder`] sink writes the survivors into a fresh,
//! valid store file.
//!
//! The source file is never modified; salvage output always lands in a
//! newly created file.

pub mod build;
pub mod classify;
pub mod detect;
pub mod error;
pub mod format;
pub mod io;
pub mod reader;
pub mod scan;

pub use error::{Result, SalvageError};
