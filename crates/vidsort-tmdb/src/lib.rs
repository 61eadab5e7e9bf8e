// SPDX-License-Identifier: GPL-3.0-or-later

//! TMDB API client for movie and TV series metadata lookups.
//!
//! This crate provides a thin client for the The Movie Database search
//! endpoints with built-in rate limiting. Similarity scoring against
//! search results lives in the application crate; this crate only speaks
//! the wire protocol.

pub mod client;
#[cfg(test)]
mod client_tests;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use client::TmdbClient;
pub use error::{Result, TmdbError};
pub use models::{MovieResult, SearchQuery, SearchResponse, TvResult};
