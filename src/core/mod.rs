// src/core/mod.rs
pub mod context;
pub mod engine;
pub mod lexicon;
pub mod types;
