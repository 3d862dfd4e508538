pub mod api_connection;
pub mod cli;
pub mod config;
pub mod nutrition;
pub mod optim;
pub mod recognition;
pub mod sync;
