pub mod api;
pub mod cache;
pub mod chain;
pub mod cli;
pub mod upstream;
