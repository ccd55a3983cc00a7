//! Downstream conversational agent.
//!
//! - `client` - invocation over HTTP, plus a mock
//! - `events` - the response stream's event records
//! - `aggregator` - folds an event stream into the final answer

pub mod aggregator;
pub mod client;
pub mod events;

pub use aggregator::{aggregate, aggregate_stream, APOLOGY_RESPONSE, EMPTY_RESPONSE};
pub use client::{AgentClient, AgentEventStream, AgentRequest, HttpAgentClient};
pub use events::AgentEvent;
