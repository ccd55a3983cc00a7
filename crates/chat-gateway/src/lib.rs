//! Chat Gateway Library
//!
//! Authenticated HTTP front door for a conversational agent.
//!
//! # Modules
//!
//! - `auth` - token authorizer, key set cache, JWT validation
//! - `agent` - agent client and response aggregation
//! - `config` - service configuration
//! - `errors` - error types
//! - `handlers` - HTTP handlers
//! - `middleware` - auth and metrics middleware
//! - `models` - request/response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - router and shared state

pub mod agent;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
