//! protannot common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the protannot workspace members:
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **File Output**: atomic write-then-rename helpers for run artifacts
//! - **Checksums**: SHA-256 fingerprints recorded in run manifests
//!
//! # Example
//!
//! ```no_run
//! use protannot_common::fsutil::write_atomic;
//!
//! # async fn demo() -> protannot_common::Result<()> {
//! write_atomic("out/seq_ids.txt", b"P01308\n").await?;
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod error;
pub mod fsutil;
pub mod logging;

pub use error::{CommonError, Result};
