pub mod conditions;
pub mod executor;
pub mod planner;
pub mod query_builder;
pub mod row_count;
pub mod session;
pub mod time_window;
pub mod validator;
