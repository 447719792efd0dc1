pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod redirect;
pub mod shortener;
pub mod storage;
pub mod sweep;
