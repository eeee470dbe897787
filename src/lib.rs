//! # burn_tools
//!
//! Reader, writer, and inscribe pipeline for Burn bundle containers: the
//! binary envelope appended to a native executable stub that carries a UX
//! payload container and optional attached data containers.
//!
//! The crate supports the supply-chain-secure signing workflow: build an
//! unsigned bundle, detach its engine (stub + UX container) for external
//! signing, then reattach the signed engine to the original attached
//! container to produce the final distributable bundle.
//!
//! ## Features
//!
//! - **Anchored stamp lookup**: the bundle header is found through the PE
//!   section table, never a blind byte scan
//! - **Validate-then-trust**: every recorded offset/length is checked
//!   against the actual file size before any region copy
//! - **Crash-safe publishing**: all mutation is staged in a temp file and
//!   made visible with a single rename
//! - **Signature hygiene**: appends are refused until a stale Authenticode
//!   signature has been explicitly neutralized
//!
//! ## Usage
//!
//! ```bash
//! burn detach bundle.exe --engine engine.exe
//! burn reattach bundle.exe --engine signed.exe --out final.exe
//! burn extract bundle.exe --out extracted/
//! burn remote-payload payload.dll --out report.json
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod cli;
pub mod container;
pub mod error;
pub mod fsutil;
pub mod inscribe;
pub mod payload;
pub mod pe;
pub mod reader;
pub mod stamp;
pub mod writer;

// Re-export main types for public API
pub use cli::Args;
pub use container::ContainerType;
pub use error::{Context, Error, ErrorExt, Result};
pub use inscribe::{detach_engine, reattach_engine};
pub use payload::{harvest_files, PayloadRecord};
pub use reader::BurnReader;
pub use stamp::BurnStamp;
pub use writer::BurnWriter;
