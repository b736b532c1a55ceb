//! Gateway in front of the Gemini `generateContent` API
//!
//! Accepts a generic generation request, then walks an ordered catalog of
//! (endpoint version, payload shape, model) candidates until one succeeds,
//! a failure proves that no candidate can succeed, or the catalog runs out.

pub mod adapter;
pub mod app;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod discovery;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod upstream;

pub use error::{Error, Result};
