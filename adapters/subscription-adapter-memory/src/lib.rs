//! In-memory push subscription adapter
//!
//! Keeps subscriptions in a HashMap keyed by endpoint, which makes the
//! store's endpoint-uniqueness invariant structural: storing a
//! subscription whose endpoint already exists replaces the old row, no
//! matter which employee owned it. Used by the delivery crate's tests and
//! by embedders that do not need durable storage.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use attenda_types::prelude::*;
use attenda_types::subscription_adapter::{
	PushSubscription, PushSubscriptionData, SubscriptionAdapter,
};

#[derive(Debug, Default)]
pub struct SubscriptionAdapterMemory {
	subscriptions: RwLock<HashMap<String, PushSubscription>>,
	next_id: AtomicU64,
}

impl SubscriptionAdapterMemory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored subscriptions.
	pub async fn len(&self) -> usize {
		self.subscriptions.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.subscriptions.read().await.is_empty()
	}
}

#[async_trait]
impl SubscriptionAdapter for SubscriptionAdapterMemory {
	async fn list_by_employee(
		&self,
		employee_id: &EmployeeId,
	) -> AtResult<Vec<PushSubscription>> {
		let subscriptions = self.subscriptions.read().await;
		let mut list: Vec<PushSubscription> = subscriptions
			.values()
			.filter(|sub| &sub.employee_id == employee_id)
			.cloned()
			.collect();
		// HashMap iteration order is arbitrary; keep listings stable.
		list.sort_by_key(|sub| sub.subs_id);
		Ok(list)
	}

	async fn create_subscription(
		&self,
		employee_id: &EmployeeId,
		data: &PushSubscriptionData,
	) -> AtResult<u64> {
		let subs_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
		let row = PushSubscription {
			subs_id,
			employee_id: employee_id.clone(),
			subscription: data.clone(),
			created_at: Timestamp::now(),
		};

		// Re-subscribes reuse the endpoint; inserting replaces the old row.
		self.subscriptions.write().await.insert(data.endpoint.clone(), row);
		Ok(subs_id)
	}

	async fn delete_by_endpoint(&self, endpoint: &str) -> AtResult<()> {
		// Deleting an absent endpoint is a no-op.
		self.subscriptions.write().await.remove(endpoint);
		Ok(())
	}
}


// vim: ts=4
