pub mod band;
pub mod batch;
pub mod config;
pub mod error;
pub mod generator;
pub mod history;
pub mod parse;
pub mod patterns;
pub mod payload;
pub mod phases;
pub mod pools;
pub mod scorer;
