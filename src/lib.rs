// src/lib.rs
pub mod cli;
pub mod config;
pub mod pipelines;
pub mod router;
pub mod utils;
pub use cli::{Arguments, Module, Profile};
