//! # FuseML Core
//!
//! Control plane of the FuseML MLOps platform: codesets, projects, runnables, workflows
//! and the extension registry, served over HTTP and usable as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! fuseml-core = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fuseml_core::server::{AppState, create_router};
//! use fuseml_core::service::Services;
//!
//! let state = Arc::new(AppState::new(Services::in_memory()));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI client module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
