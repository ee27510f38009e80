pub mod app;
pub mod config;
pub mod engine;
pub mod history;
pub mod migration;
pub mod notify;
pub mod shared;
pub mod snapshot;
