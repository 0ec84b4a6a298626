pub mod api;
pub mod clients;
pub mod config;
pub mod errors;
pub mod models;
pub mod notifications;
pub mod utils;
