//! Inbound webhook plumbing for the identity provider.
pub mod svix;

pub use svix::{SignatureError, SvixHeaders, WebhookVerifier};
