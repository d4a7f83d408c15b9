//! # bucketdb bench
//!
//! Shared data generators for the criterion benchmarks under `benches/`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
