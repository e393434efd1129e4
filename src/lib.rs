pub mod access;
pub mod accounting;
pub mod cli;
pub mod clock;
pub mod config;
pub mod curve;
pub mod custody;
pub mod error;
pub mod facade;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod tap;
pub mod types;
