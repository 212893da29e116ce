pub mod agent;
pub mod config;
pub mod events;
pub mod input;
pub mod state;
