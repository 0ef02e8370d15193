pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod images;
pub mod logging;
pub mod observability;
pub mod server;
pub mod storage;
