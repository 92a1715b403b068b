//! GitHub webhook ingress.

pub mod server;
pub mod signature;

pub use server::{WebhookHandler, WebhookServer, WebhookServerConfig, WebhookState};
pub use signature::{verify_signature, SignatureError};
