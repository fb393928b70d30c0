//! NDVI API Service Library
//!
//! This crate provides the HTTP server that exposes derived
//! vegetation-health data as map tiles and single-point samples.

pub mod config;
pub mod handlers;
pub mod state;
