//! Push notification module
//!
//! Delivers Web Push notifications to employees' browsers without an
//! external push SDK.
//!
//! # Features
//!
//! - VAPID authentication (RFC 8292) with hand-rolled ES256 JWTs
//! - Web Push message encryption (RFC 8188, 8291)
//! - Per-message ephemeral ECDH key agreement
//! - Per-employee fan-out with self-healing pruning of dead subscriptions
//!
//! Subscription storage is behind the `SubscriptionAdapter` trait in
//! `attenda-types`; registering and unregistering subscriptions is the
//! surrounding application's concern.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod ecdh;
pub mod encrypt;
pub mod send;
pub mod vapid;

mod prelude;

pub use encrypt::EncryptedPushRecord;
pub use send::{DeliveryStats, PushMessage, PushResult, PushService};
pub use vapid::VapidConfig;

// vim: ts=4
