//! fb2shelf: a personal FB2 library server with paginated reading and bookmarks.
//!
//! This crate provides a small web service where each user keeps their own
//! shelf of FB2 (FictionBook) e-books: register, log in, upload files, read
//! them page by page over a JSON API, and resume from a saved bookmark.
//!
//! # Features
//!
//! - User accounts with token sessions
//! - Per-user FB2 uploads
//! - FB2 text extraction (UTF-8 and windows-1251 sources)
//! - Fixed-size codepoint pagination
//! - One bookmark per (user, book), updated only on explicit request
//! - Extracted-text caching keyed by file modification time

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// FB2 parsing.
pub mod fb2;
/// Text pagination.
pub mod reader;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
