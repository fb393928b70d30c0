//! HTTP request handlers for the NDVI API.

pub mod common;
pub mod health;
pub mod recommend;
pub mod tiles;
pub mod value;
