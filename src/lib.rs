pub mod api;
pub mod core;
pub mod error;
pub mod infra;
pub mod models;
pub mod state;
