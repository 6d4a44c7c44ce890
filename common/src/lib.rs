//! Shared building blocks for the UDP prober: probe options, the target model
//! and the parsers that turn user input into targets and ports.

pub mod config;
pub mod error;
pub mod network;
