pub mod activity;
pub mod database;
pub mod http;
