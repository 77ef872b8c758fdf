pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod language;
pub mod record;
pub mod retry;
pub mod security;
pub mod server;
pub mod store;
pub mod translator;
