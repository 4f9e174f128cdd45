pub mod backend;
pub mod config;
pub mod db_external;
pub mod probe;
pub mod rows;
pub mod sink;
