//! The HTTP front door: wires the procedure catalog, the OAuth server, the
//! MCP tool surface and the payment webhook into one [`axum::Router`], and
//! provides [`bootstrap::build_app_state`] to construct the shared
//! [`AppState`] from a loaded [`ServerConfig`] (spec §6).

pub mod app;
mod bootstrap;
pub mod config;
pub mod error;
pub mod frontdoor;
pub mod health;
pub mod mcp_http;
pub mod oauth;
pub mod principal;
pub mod procedures;
pub mod ratelimit;
pub mod state;
pub mod webhook;

pub use app::build_router;
pub use bootstrap::{build_app_state, BootstrapError};
pub use config::ServerConfig;
pub use state::AppState;
