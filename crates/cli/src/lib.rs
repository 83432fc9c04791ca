pub mod api_client;
pub mod commands;
pub mod config;
pub mod password;
pub mod pipeline;
pub mod render;
pub mod session;
