//! Renderers for `url-risk analyze` results.
//!
//! - [`terminal`]: colored summary per URL; `--verbose` adds a feature table.

pub mod terminal;
