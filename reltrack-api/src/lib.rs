//! # Reltrack API Server Library
//!
//! HTTP surface of the release tracker. The domain logic lives in
//! `reltrack-shared`; this crate wires it to axum.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `bootstrap`: Startup admin provisioning
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
