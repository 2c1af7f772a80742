//! # decomp-scan
//!
//! Finds search terms across XML files and .NET modules. Modules are
//! decompiled by an external tool first; that output is cached by content
//! hash so identical modules are only decompiled once.
//!
//! ## Architecture
//!
//! - **model**: scan request and match result types
//! - **matcher**: case-insensitive term counting and snippet extraction
//! - **dedup**: module whitelists and the per-run processed-hash set
//! - **cache**: content-addressed store of decompiled trees
//! - **decompiler**: decompiler abstraction and the ILSpy command-line backend
//! - **scan**: candidate discovery under the configured roots
//! - **progress**: event stream, sinks and cancellation
//! - **pipeline**: the scan state machine and worker pool
//! - **config**: settings file and path resolution for the CLI

pub mod cache;
pub mod cli;
pub mod config;
pub mod decompiler;
pub mod dedup;
pub mod error;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod scan;
pub mod util;
