//! HTTP request handlers for the Chat Gateway.

pub mod authorize;
pub mod chat;
pub mod health;
pub mod metrics;

pub use authorize::authorize;
pub use chat::chat;
pub use health::health_check;
pub use metrics::metrics_handler;
