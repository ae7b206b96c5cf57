// src/lib.rs

pub mod config;
pub mod delivery;
pub mod eventbus;
pub mod http;
pub mod ingestion;
pub mod prizes;
pub mod queue;
pub mod services;
pub mod tasks;
pub mod test_utils;
pub mod utils;
pub mod web;

pub use clawbot_common::error::Error;
pub use config::ClawConfig;
pub use http::{DefaultHttpClient, HttpClient};
