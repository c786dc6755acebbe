//! Mirror NDEx networks into S3.
//!
//! [`app::App::generate_manifest`] queries the NDEx search API and writes a
//! manifest of network descriptors; [`app::App::transfer`] reads it back and
//! streams each network into the configured bucket, one unit per entry.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod manifest;
pub mod ndex;
pub mod output;
pub mod sink;
pub mod transfer;
