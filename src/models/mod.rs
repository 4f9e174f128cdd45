pub mod context;
pub mod filter;
pub mod schema;
