//! Thread placement for the dispatch path
//!
//! - **CPU affinity**: pin each stage thread to its configured core

pub mod cpu;

pub use cpu::{core_for_stage, num_cores, pin_to_core};
