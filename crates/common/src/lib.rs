//! Common utilities and types shared across Academy components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (header parsing, size limits, iat checks)
pub mod jwt;

/// Module for the key-value store capability (in-memory and Redis)
pub mod kv;
