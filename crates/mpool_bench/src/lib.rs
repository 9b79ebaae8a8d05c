//! Shared setup for the mpool benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
