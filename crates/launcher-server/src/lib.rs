//! # launcher-server
//!
//! HTTP front end for the StyleTTS 2 launcher.
//!
//! Provides:
//! - `POST /generate` synthesis endpoint
//! - `GET /gpu-info` hardware query
//! - Health, readiness and Prometheus metrics endpoints

pub mod server;
pub mod service;

pub use server::{AppState, LauncherServer, ServerSettings, build_router};
pub use service::MessageBody;
