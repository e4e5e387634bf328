//! Batch client for a remote PDF compression service.
//!
//! Files listed in a manifest are handed to a fixed pool of workers; each
//! worker walks a file through start, upload, process and download, and
//! removes the original once the compressed copy is on disk. A single
//! [`guard::TokenGuard`] makes sure a rejected token is refreshed once, no
//! matter how many workers notice at the same time.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod job;
pub mod logging;
pub mod manifest;
pub mod slug;
pub mod source;
pub mod store;
pub mod ui;
pub mod workflow;

pub use error::PressError;
