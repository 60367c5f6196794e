// src/config/mod.rs
pub mod gator;

pub use gator::GatorConfig;
