pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod hn;
pub mod logging;
pub mod state;
pub mod utils;
pub mod web;
