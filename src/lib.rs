pub mod config;
pub mod stdio;
