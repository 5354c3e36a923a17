//! Shared protocol vocabulary for the AI request gateway.
//!
//! This crate holds the types that the envelope surface, the typed surface,
//! the MCP tool surface and every component crate agree on: the JSON
//! envelope itself, the numeric/typed error taxonomy, and the principal and
//! scope model used by the auth and policy layers. Nothing here talks to a
//! network socket or a database; it is pure vocabulary.

pub mod envelope;
pub mod error;
pub mod principal;
pub mod scope;

pub use envelope::{EnvelopeError, EnvelopeRequest, EnvelopeResponse, RequestId, ResponseId};
pub use error::{ErrorKind, GatewayError};
pub use principal::Principal;
pub use scope::ScopeRequirement;
