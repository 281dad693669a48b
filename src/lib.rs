pub mod analytics;
pub mod auth;
pub mod balance;
pub mod client;
pub mod config;
pub mod currency;
pub mod error;
pub mod exchange;
pub mod handlers;
pub mod schemas;
pub mod service;
pub mod store;
pub mod validation;

pub use crate::config::Config;
pub use crate::error::{Result, WarikanError};
