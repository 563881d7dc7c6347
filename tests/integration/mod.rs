//! Integration tests for tokio_esi
//!
//! Every test starts its own server on an ephemeral port, serving a
//! temporary document root, so no external setup is required.
//!
//! Run with: cargo test --test integration

mod helpers;

mod esi_pipeline;
mod internal_server;
mod processor;
mod static_files;
