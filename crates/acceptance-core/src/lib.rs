pub mod actions;
pub mod boundary;
pub mod config;
pub mod coverage;
pub mod error;
pub mod executor;
pub mod io;
pub mod log;
pub mod paths;
pub mod plan;
pub mod preflight;
pub mod report;
pub mod runner;
pub mod summary;

pub use error::{AcceptanceError, Result};
