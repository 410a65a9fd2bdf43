pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod probe;
pub mod prober;
pub mod report;
pub mod signals;
pub mod status;
pub mod utils;
