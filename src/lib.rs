pub mod access;
pub mod cache;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod handlers;
pub mod matcher;
pub mod staging;
pub mod telemetry;
pub mod utils;
