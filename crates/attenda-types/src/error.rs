//! Error types shared across the Attenda push workspace.

use std::fmt;

pub type AtResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Missing or invalid VAPID key material. Fatal at startup.
	Config(String),

	/// Stored subscription carries undecodable key material or an
	/// unparseable endpoint. Per-subscription; the row is retained.
	MalformedSubscription(String),

	/// Client public key fails point validation (wrong length, wrong
	/// prefix, or off-curve). The row is retained: this can mean
	/// client-side corruption or an attack, not expiry.
	KeyAgreement(String),

	/// Content encryption primitive failure.
	Encryption(String),

	/// VAPID JWT signing failure.
	Signing(String),

	/// Subscription row not found.
	NotFound,

	/// Storage backend error.
	DbError,

	/// Anything else.
	Internal(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Config(msg) => write!(f, "Configuration error: {}", msg),
			Error::MalformedSubscription(msg) => write!(f, "Malformed subscription: {}", msg),
			Error::KeyAgreement(msg) => write!(f, "Key agreement error: {}", msg),
			Error::Encryption(msg) => write!(f, "Encryption error: {}", msg),
			Error::Signing(msg) => write!(f, "Signing error: {}", msg),
			Error::NotFound => write!(f, "Not found"),
			Error::DbError => write!(f, "Database error"),
			Error::Internal(msg) => write!(f, "Internal error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

// vim: ts=4
