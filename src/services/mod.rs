//! Network services for the metro simulation.
//!
//! With the `web` feature the crate exposes an Axum HTTP API that reads the
//! live map and drives the simulation lifecycle. Every handler goes through
//! one [`SharedSimulation`] wrapped in `Arc`:
//!
//! ```ignore
//! use std::sync::Arc;
//! use rs_metro::services::{build_router, SharedSimulation, WebServerConfig};
//!
//! let shared = Arc::new(SharedSimulation::new(controller));
//! let router = build_router(Arc::clone(&shared), &WebServerConfig::default());
//! ```

pub mod api;
pub mod shared;
pub mod web;

pub use api::*;
pub use shared::*;
pub use web::*;
