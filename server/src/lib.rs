pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scanner;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
