//! Album playlist builder - shared modules for all binaries.
//!
//! Resolves `Artist - Album (Year)` references against a folder-based music
//! library and collects the tracks of each matched album.

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod input;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod resolve;
pub mod safety;
pub mod scoring;
pub mod selector;
pub mod tracks;
