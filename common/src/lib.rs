// Common library for the DUW queue monitor: scheduling, change detection, persistence

pub mod bootstrap;
pub mod calendar;
pub mod config;
pub mod cycle;
pub mod db;
pub mod detector;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod telemetry;
