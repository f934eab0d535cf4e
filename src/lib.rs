pub mod config;
pub mod dataset;
pub mod error;
pub mod interval;
pub mod probability;
pub mod read;
pub mod rng;
pub mod simulation;
pub mod write;

pub use error::{Error, Result};
