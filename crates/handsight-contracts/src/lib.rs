pub mod commands;
pub mod config;
pub mod events;
pub mod results;
pub mod uploads;
