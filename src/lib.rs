//! Pkgsearch - Package Search API Service
//!
//! This crate implements the HTTP front of a package search API. Each client
//! is throttled by a per-client fixed-window rate limiter that reclaims the
//! state of idle clients in the background.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;

pub use error::{Error, Result};
