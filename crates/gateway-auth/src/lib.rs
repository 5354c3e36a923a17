//! OAuth2 authorization server, bearer validation and scope policy.
//!
//! The server issues and stores its own opaque access/refresh tokens rather
//! than delegating to an upstream OAuth provider — `gateway-server` mounts
//! these routes directly, and federated login (when configured) is a detail
//! of *how* `/authorize` establishes `user_id`, not of this crate's token
//! model.

pub mod bearer;
pub mod dcr;
pub mod discovery;
mod error;
pub mod pkce;
pub mod scope;
pub mod server;
mod store;
mod types;

pub use error::AuthError;
pub use store::AuthStore;
pub use types::{AccessToken, AuthCode, OAuthClient, PkceMethod, TokenResponse};
