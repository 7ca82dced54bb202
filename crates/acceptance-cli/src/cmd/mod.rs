pub mod config;
pub mod coverage;
pub mod init;
pub mod log;
pub mod preflight;
pub mod report;
pub mod run;
