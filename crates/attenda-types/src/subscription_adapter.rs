//! Adapter that stores browser push subscriptions.
//!
//! Implemented by the surrounding application's persistence layer. The
//! delivery crate only ever lists an employee's subscriptions and deletes
//! the ones a push service reports as permanently gone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::prelude::*;

/// Browser subscription keys, base64url-encoded as the Push API hands
/// them out. Decoding and validation happen at send time, so a corrupt
/// row surfaces per delivery instead of poisoning the whole store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushSubscriptionKeys {
	/// Client ECDH public key (base64url, 65 bytes decoded).
	pub p256dh: String,
	/// Shared auth secret (base64url, 16 bytes decoded).
	pub auth: String,
}

/// One browser's push subscription as received from the Push API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushSubscriptionData {
	/// Push service endpoint URL. Unique across the whole store.
	pub endpoint: String,
	/// Subscription keys.
	pub keys: PushSubscriptionKeys,
}

/// A stored push subscription row.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushSubscription {
	/// Storage-assigned row ID.
	pub subs_id: u64,
	/// Employee owning this subscription. One employee may own several
	/// (multi-device).
	pub employee_id: EmployeeId,
	/// The browser subscription.
	pub subscription: PushSubscriptionData,
	/// When the subscription was registered.
	pub created_at: Timestamp,
}

/// An Attenda subscription adapter
///
/// Every `SubscriptionAdapter` implementation is required to implement this
/// trait. Implementations must be safe under concurrent invocation: two
/// overlapping notifications to the same employee may list and delete at
/// the same time.
#[async_trait]
pub trait SubscriptionAdapter: Debug + Send + Sync {
	/// Lists all push subscriptions owned by an employee.
	async fn list_by_employee(&self, employee_id: &EmployeeId)
		-> AtResult<Vec<PushSubscription>>;

	/// Stores a subscription, returning the new row ID.
	///
	/// The endpoint is unique: if any employee already holds a subscription
	/// with the same endpoint, that row is replaced (a browser re-subscribe
	/// reuses the endpoint but may rotate keys or owner).
	async fn create_subscription(
		&self,
		employee_id: &EmployeeId,
		data: &PushSubscriptionData,
	) -> AtResult<u64>;

	/// Deletes the subscription with the given endpoint.
	///
	/// Idempotent: deleting an absent endpoint is a no-op, not an error.
	/// Called by the delivery crate when a push service answers 404/410.
	async fn delete_by_endpoint(&self, endpoint: &str) -> AtResult<()>;
}


// vim: ts=4
