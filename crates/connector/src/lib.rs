//! vybe-live: live Solana DEX trade ingest
//!
//! This crate provides the components for streaming trade events from the
//! Vybe live endpoint into a bounded buffer, and for retrieving recent
//! formatted trades from it on demand.

pub mod buffer;
pub mod classify;
pub mod config;
pub mod connection;
pub mod dex;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod messages;
pub mod metrics;
pub mod poller;
pub mod rest;
pub mod server;
pub mod service;
pub mod traits;
pub mod websocket;

pub use buffer::EventBuffer;
pub use classify::is_relevant;
pub use config::LiveConfig;
pub use connection::{ConnectionState, StreamConnection};
pub use dex::Dex;
pub use dispatcher::{subscription_channel, SubscriptionDispatcher, SubscriptionQueue};
pub use error::{ConfigError, ConnectorError, RestError};
pub use format::{format_transaction, FormattedRecord};
pub use poller::{PollOutcome, RetrievalPoller};
pub use rest::SnapshotClient;
pub use server::{create_router, run_server, ServerState};
pub use service::LiveTrades;
pub use traits::{StreamDialer, StreamSession};
pub use websocket::{VybeDialer, VybeWebSocket};
