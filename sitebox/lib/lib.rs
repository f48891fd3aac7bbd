//! `sitebox` registers a sandboxed project runtime with a REST backend and persists its files.
//!
//! # Overview
//!
//! A chat-driven site generator writes a project into a sandbox. sitebox takes care of the
//! backend side of that sandbox:
//! - registering it as a runtime record, exactly once per process
//! - mirroring its lifecycle status and opened ports into the record
//! - pushing a full snapshot of its file tree after each generation
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sitebox::{
//!     config::SiteboxConfig,
//!     registry::HttpRegistry,
//!     runtime::{ContentSaver, RuntimeCoordinator},
//!     sandbox::{NativeSandbox, SandboxBoot},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SiteboxConfig::from_env()?;
//!     let registry = Arc::new(HttpRegistry::from_config(&config)?);
//!     let boot = SandboxBoot::spawn(NativeSandbox::boot("./site"));
//!
//!     let coordinator = RuntimeCoordinator::new(registry, boot, config);
//!     if let Some(id) = coordinator.ensure_registered(Some("my-project")).await {
//!         println!("registered runtime {id}");
//!     }
//!
//!     // ... generate files into ./site ...
//!
//!     let saved = ContentSaver::new(coordinator).save_content(Some("my-project")).await;
//!     println!("saved: {saved}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration, credentials and defaults
//! - [`export`] - Flattening a sandbox file tree into a snapshot
//! - [`models`] - Records exchanged with the backend
//! - [`registry`] - Backend clients
//! - [`runtime`] - Registration coordinator and content saver
//! - [`sandbox`] - The sandbox boundary and its implementations
//! - [`utils`] - Sandbox path helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod export;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod sandbox;
pub mod utils;

pub use error::*;
