pub mod api;
pub mod config;
pub mod models;
pub mod reporting;
pub mod storage;
