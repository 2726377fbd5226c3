pub mod commands;
pub mod config;
pub mod data;
pub mod handlers;
pub mod lockdown;
pub mod logging;

// Log targets, so lockdown runs can be filtered apart from chatter
pub const BOT_NAME: &str = "lockdown_warden";
pub const COMMAND_TARGET: &str = "lockdown_warden::command";
pub const ERROR_TARGET: &str = "lockdown_warden::error";
pub const EVENT_TARGET: &str = "lockdown_warden::handlers";
pub const LOCKDOWN_TARGET: &str = "lockdown_warden::lockdown";
pub const CONSOLE_TARGET: &str = "lockdown_warden";

pub use config::Config;
pub use data::{Data, DataInner};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
