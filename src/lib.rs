//! Angluin Lab - oracle client for L* automata learning
//!
//! Drives a remote (or offline) learner to convergence by answering its
//! membership and equivalence queries:
//! - `oracle`: session state machine, query presentation, live-state
//!   reconciliation and convergence detection
//! - `api`: the learner interfaces and their GraphQL and offline implementations
//! - `catalog`: sessions, examples, hypotheses and stats
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use angluin_lab::api::offline::OfflineLearner;
//! use angluin_lab::oracle::OracleSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = OracleSession::new(Arc::new(OfflineLearner::new()));
//!     let started = session.start("Food Categorization").await?;
//!     println!("{:?}", started.current_query);
//!     session.answer("true").await?;
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod catalog;
pub mod api;
pub mod oracle;
pub mod interactive;
pub mod cli;

pub use api::{graphql::GraphQlClient, offline::OfflineLearner, CatalogApi, LearnerApi, TransportError};
pub use config::Config;
pub use error::OracleError;
pub use oracle::{OracleSession, RenderableQuery, SessionState};
pub use types::{QueryId, QueryKind, SessionId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - L* oracle client", NAME, VERSION)
}

/// Cut `s` to at most `max_bytes` without splitting a character
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
