pub mod artifact;
pub mod config;
pub mod lm;
pub mod pipeline;
pub mod transform;
pub mod types;
