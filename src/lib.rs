pub mod api;
pub mod bot;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod kill;
pub mod messenger;
pub mod metrics;
pub mod render;
pub mod respawn;
pub mod scanner;
pub mod store;
pub mod upcoming;
