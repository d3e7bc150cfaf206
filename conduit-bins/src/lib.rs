//! Conduit binaries: shared CLI and reporting helpers

pub mod common;
