pub mod analyzer;
pub mod config;
pub mod filters;
pub mod generator;
pub mod predict;
pub mod ranking;
pub mod sampler;
pub mod scoring;
