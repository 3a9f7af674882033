pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod foods;
pub mod state;
pub mod suggestions;
