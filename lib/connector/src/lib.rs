//! Bot Framework REST connector for notiteams.
//!
//! Implements [`MessageTransport`](notiteams_core::MessageTransport) against
//! the Bot Connector service: deleting activities, and opening a 1:1
//! conversation to post a private message. Requests are authorized with an
//! app-only access token obtained through the OAuth2 client-credentials
//! grant and cached until shortly before it expires.

pub mod auth;
pub mod config;
pub mod connector;
mod wire;

pub use auth::{AccessToken, ClientCredentials, TokenSource};
pub use config::ConnectorConfig;
pub use connector::BotConnector;
