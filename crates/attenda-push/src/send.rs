//! Web Push delivery and per-employee notification fan-out
//!
//! Implements RFC 8030 delivery over HTTPS: the encrypted record is POSTed
//! to the subscription's push service endpoint with VAPID (RFC 8292)
//! authorization headers, and the response is classified into the three
//! outcomes the caller can act on.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use futures::stream::{self, StreamExt};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::encrypt::{self, EncryptedPushRecord, AUTH_SECRET_LEN};
use crate::prelude::*;
use crate::vapid::{self, VapidConfig};
use attenda_types::subscription_adapter::{
	PushSubscription, PushSubscriptionKeys, SubscriptionAdapter,
};

/// Push messages stay queued at the push service for 24 hours.
const TTL_SECS: u64 = 86400;
/// Upper bound for a single delivery attempt, connect included.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Concurrent deliveries per façade call.
const DEFAULT_CONCURRENCY: usize = 8;

/// Notification payload sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
	/// Notification title
	pub title: String,
	/// Notification body text
	pub body: String,
	/// Icon URL (optional)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
	/// URL path to open when clicked
	pub url: String,
}

impl PushMessage {
	/// A message opening the app root when clicked, without an icon.
	pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
		Self { title: title.into(), body: body.into(), icon: None, url: "/".into() }
	}
}

/// Result of one delivery attempt
#[derive(Debug)]
pub enum PushResult {
	/// The push service accepted the message.
	Delivered,
	/// 404/410: the subscription is permanently invalid and should be
	/// deleted.
	SubscriptionGone,
	/// Network error, timeout, or an unexpected status. The subscription
	/// is retained; retrying is the caller's decision.
	TransientError(String),
}

/// Aggregate outcome of one `notify_employee` call. Not persisted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeliveryStats {
	pub sent: u32,
	pub failed: u32,
}

type HttpsClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Web Push delivery service.
///
/// Owns the VAPID configuration, the subscription store handle and the
/// HTTP client. Constructed once at startup; concurrent use needs no
/// locking, every encryption call derives fresh per-message material.
pub struct PushService {
	vapid: VapidConfig,
	subscriptions: Arc<dyn SubscriptionAdapter>,
	client: HttpsClient,
	concurrency: usize,
}

impl PushService {
	pub fn new(vapid: VapidConfig, subscriptions: Arc<dyn SubscriptionAdapter>) -> AtResult<Self> {
		let connector = HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|e| Error::Config(format!("TLS root store error: {}", e)))?
			.https_or_http()
			.enable_all_versions()
			.build();
		let client = Client::builder(TokioExecutor::new()).build(connector);

		Ok(Self { vapid, subscriptions, client, concurrency: DEFAULT_CONCURRENCY })
	}

	/// Override the fan-out concurrency bound.
	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency.max(1);
		self
	}

	/// The base64url VAPID public key browsers use as `applicationServerKey`.
	pub fn vapid_public_key(&self) -> &str {
		self.vapid.public_key_b64url()
	}

	/// Notify an employee on every device they own a subscription for.
	///
	/// Subscriptions are processed independently: one failing delivery
	/// never aborts or skips the others, and a subscription the push
	/// service reports gone is pruned on the spot. Only aggregate counts
	/// come back; notification delivery must never fail the business
	/// action that triggered it.
	pub async fn notify_employee(
		&self,
		employee_id: &EmployeeId,
		message: &PushMessage,
	) -> DeliveryStats {
		let subs = match self.subscriptions.list_by_employee(employee_id).await {
			Ok(subs) => subs,
			Err(e) => {
				error!(employee_id = %employee_id, error = %e, "Failed to list push subscriptions");
				return DeliveryStats::default();
			}
		};
		if subs.is_empty() {
			debug!(employee_id = %employee_id, "No push subscriptions");
			return DeliveryStats::default();
		}

		let plaintext = match serde_json::to_vec(message) {
			Ok(json) => json,
			Err(e) => {
				error!(employee_id = %employee_id, error = %e, "Failed to serialize push payload");
				return DeliveryStats { sent: 0, failed: subs.len() as u32 };
			}
		};

		let plaintext = &plaintext;
		let results: Vec<bool> = stream::iter(subs)
			.map(|sub| async move { self.notify_subscription(employee_id, &sub, plaintext).await })
			.buffer_unordered(self.concurrency)
			.collect()
			.await;

		let sent = results.iter().filter(|sent| **sent).count() as u32;
		DeliveryStats { sent, failed: results.len() as u32 - sent }
	}

	/// Convenience wrapper building the payload from title and body.
	pub async fn notify(&self, employee_id: &EmployeeId, title: &str, body: &str) -> DeliveryStats {
		self.notify_employee(employee_id, &PushMessage::new(title, body)).await
	}

	/// Encrypt, sign and deliver to a single subscription. All errors are
	/// classified here; nothing propagates to the sibling deliveries.
	/// Returns whether the message was delivered.
	async fn notify_subscription(
		&self,
		employee_id: &EmployeeId,
		sub: &PushSubscription,
		plaintext: &[u8],
	) -> bool {
		match self.try_deliver(sub, plaintext).await {
			Ok(PushResult::Delivered) => {
				debug!(
					employee_id = %employee_id,
					subs_id = %sub.subs_id,
					"Push notification sent"
				);
				true
			}
			Ok(PushResult::SubscriptionGone) => {
				info!(
					employee_id = %employee_id,
					endpoint = %sub.subscription.endpoint,
					"Deleting invalid push subscription"
				);
				if let Err(e) = self.subscriptions.delete_by_endpoint(&sub.subscription.endpoint).await
				{
					warn!(error = %e, "Failed to delete invalid push subscription");
				}
				false
			}
			Ok(PushResult::TransientError(e)) => {
				warn!(
					employee_id = %employee_id,
					subs_id = %sub.subs_id,
					error = %e,
					"Transient push delivery error"
				);
				false
			}
			// Internal primitive failures: our bug or our misconfiguration.
			Err(e @ (Error::Encryption(_) | Error::Signing(_))) => {
				error!(
					employee_id = %employee_id,
					subs_id = %sub.subs_id,
					error = %e,
					"Push encryption failed"
				);
				false
			}
			// Malformed or off-curve client material. Retained: this can
			// be client-side corruption or an attack, not expiry.
			Err(e) => {
				warn!(
					employee_id = %employee_id,
					subs_id = %sub.subs_id,
					error = %e,
					"Unusable push subscription"
				);
				false
			}
		}
	}

	async fn try_deliver(&self, sub: &PushSubscription, plaintext: &[u8]) -> AtResult<PushResult> {
		let (p256dh, auth) = decode_subscription_keys(&sub.subscription.keys)?;
		let record = encrypt::encrypt(&p256dh, &auth, plaintext)?;
		let audience = vapid::audience_origin(&sub.subscription.endpoint)?;
		let jwt = self.vapid.sign(&audience)?;
		Ok(self.deliver(&sub.subscription.endpoint, &jwt, record).await)
	}

	/// POST one encrypted record to a push service endpoint and classify
	/// the response (RFC 8030). Exactly one attempt; retry policy, if any,
	/// belongs to the caller.
	pub async fn deliver(
		&self,
		endpoint: &str,
		jwt: &str,
		record: EncryptedPushRecord,
	) -> PushResult {
		let body_len = record.len();
		let request = match hyper::Request::builder()
			.method(hyper::Method::POST)
			.uri(endpoint)
			.header("Content-Type", "application/octet-stream")
			.header("Content-Encoding", "aes128gcm")
			.header("Content-Length", body_len)
			.header("TTL", TTL_SECS)
			.header(
				"Authorization",
				format!("vapid t={}, k={}", jwt, self.vapid.public_key_b64url()),
			)
			.body(Full::new(Bytes::from(record.into_vec())))
		{
			Ok(req) => req,
			Err(e) => return PushResult::TransientError(format!("request build error: {}", e)),
		};

		let response =
			match tokio::time::timeout(DELIVERY_TIMEOUT, self.client.request(request)).await {
				Ok(Ok(response)) => response,
				Ok(Err(e)) => return PushResult::TransientError(format!("network error: {}", e)),
				Err(_) => {
					return PushResult::TransientError(format!(
						"no response within {}s",
						DELIVERY_TIMEOUT.as_secs()
					))
				}
			};

		let status = response.status();
		if status.is_success() {
			PushResult::Delivered
		} else if status == hyper::StatusCode::NOT_FOUND || status == hyper::StatusCode::GONE {
			// 404/410 = subscription no longer valid
			PushResult::SubscriptionGone
		} else {
			PushResult::TransientError(format!("HTTP {}", status))
		}
	}
}

/// Decode the stored base64url key material.
///
/// Base64 and auth-secret length problems are malformed storage; the
/// public key's length and curve checks happen in the key agreement step
/// so they surface as `KeyAgreement` errors.
fn decode_subscription_keys(keys: &PushSubscriptionKeys) -> AtResult<(Vec<u8>, [u8; AUTH_SECRET_LEN])> {
	let p256dh = URL_SAFE_NO_PAD
		.decode(&keys.p256dh)
		.map_err(|e| Error::MalformedSubscription(format!("invalid p256dh base64url: {}", e)))?;
	let auth = URL_SAFE_NO_PAD
		.decode(&keys.auth)
		.map_err(|e| Error::MalformedSubscription(format!("invalid auth base64url: {}", e)))?;
	let auth: [u8; AUTH_SECRET_LEN] = auth.try_into().map_err(|v: Vec<u8>| {
		Error::MalformedSubscription(format!(
			"auth secret must be {} bytes, got {}",
			AUTH_SECRET_LEN,
			v.len()
		))
	})?;
	Ok((p256dh, auth))
}


// vim: ts=4
