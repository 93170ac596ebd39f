//! VAPID authentication (RFC 8292)
//!
//! Signs the short-lived ES256 JWT that proves this application server's
//! identity to a push service. The JWT is assembled by hand rather than
//! through a JWT library: JWS ES256 needs the signature in fixed 64-byte
//! `r || s` form, and the DER-to-raw conversion is where silent
//! incompatibilities hide.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

use crate::prelude::*;

/// VAPID JWTs expire after the RFC 8292 maximum of 24 hours.
const JWT_EXPIRY_SECS: u64 = 86400;

/// Uncompressed SEC1 P-256 point length.
const PUBLIC_KEY_LEN: usize = 65;

/// Process-wide VAPID key pair and subject.
///
/// Loaded once at startup and injected into the delivery service; never
/// regenerated at runtime. The private key is held as a P-256 signing key
/// and is not printed by the `Debug` impl.
pub struct VapidConfig {
	signing_key: SigningKey,
	public_key_b64: Box<str>,
	subject: Box<str>,
}

impl std::fmt::Debug for VapidConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VapidConfig")
			.field("public_key", &self.public_key_b64)
			.field("subject", &self.subject)
			.finish_non_exhaustive()
	}
}

impl VapidConfig {
	/// Load a key pair from base64url-encoded key material.
	///
	/// The public key must decode to the 65-byte uncompressed SEC1 point,
	/// the private key to the raw 32-byte P-256 scalar, and the two must
	/// belong together. `subject` is the contact URI put into the JWT
	/// `sub` claim (typically `mailto:...`).
	pub fn from_base64url(
		public_key_b64: &str,
		private_key_b64: &str,
		subject: &str,
	) -> AtResult<Self> {
		if subject.is_empty() {
			return Err(Error::Config("VAPID subject must not be empty".into()));
		}

		let public_bytes = URL_SAFE_NO_PAD
			.decode(public_key_b64)
			.map_err(|e| Error::Config(format!("Invalid base64url VAPID public key: {}", e)))?;
		if public_bytes.len() != PUBLIC_KEY_LEN || public_bytes[0] != 0x04 {
			return Err(Error::Config(
				"VAPID public key must be a 65-byte uncompressed P-256 point".into(),
			));
		}

		let private_bytes = URL_SAFE_NO_PAD
			.decode(private_key_b64)
			.map_err(|e| Error::Config(format!("Invalid base64url VAPID private key: {}", e)))?;
		if private_bytes.len() != 32 {
			return Err(Error::Config(format!(
				"VAPID private key must be a 32-byte P-256 scalar, got {} bytes",
				private_bytes.len()
			)));
		}
		let signing_key = SigningKey::from_bytes(private_bytes.as_slice().into())
			.map_err(|_| Error::Config("VAPID private key is not a valid P-256 scalar".into()))?;

		// A mismatched pair signs JWTs no push service will accept.
		let derived = signing_key.verifying_key().to_encoded_point(false);
		if derived.as_bytes() != public_bytes.as_slice() {
			return Err(Error::Config(
				"VAPID public key does not match the private key".into(),
			));
		}

		Ok(Self {
			signing_key,
			public_key_b64: public_key_b64.into(),
			subject: subject.into(),
		})
	}

	/// Generate a fresh key pair (first-boot provisioning).
	pub fn generate(subject: &str) -> AtResult<Self> {
		if subject.is_empty() {
			return Err(Error::Config("VAPID subject must not be empty".into()));
		}
		let signing_key = SigningKey::random(&mut OsRng);
		let public_point = signing_key.verifying_key().to_encoded_point(false);
		let public_key_b64 = URL_SAFE_NO_PAD.encode(public_point.as_bytes());

		Ok(Self { signing_key, public_key_b64: public_key_b64.into(), subject: subject.into() })
	}

	/// Base64url-encoded uncompressed public key.
	///
	/// Sent to browsers as the `applicationServerKey` and to push services
	/// in the `Authorization` header's `k=` parameter.
	pub fn public_key_b64url(&self) -> &str {
		&self.public_key_b64
	}

	/// Base64url-encoded raw 32-byte private key scalar, for persisting a
	/// generated key pair. Never log this value.
	pub fn private_key_b64url(&self) -> String {
		URL_SAFE_NO_PAD.encode(self.signing_key.to_bytes().as_slice())
	}

	/// Sign a VAPID JWT for the given push service origin (RFC 8292).
	pub fn sign(&self, audience_origin: &str) -> AtResult<String> {
		#[derive(Serialize)]
		struct Claims<'a> {
			aud: &'a str,
			exp: u64,
			sub: &'a str,
		}

		let header = serde_json::json!({ "typ": "JWT", "alg": "ES256" });
		let header_json = serde_json::to_vec(&header)
			.map_err(|e| Error::Signing(format!("JWT header serialization failed: {}", e)))?;

		let exp = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|_| Error::Signing("system clock is before the Unix epoch".into()))?
			.as_secs()
			+ JWT_EXPIRY_SECS;
		let claims = Claims { aud: audience_origin, exp, sub: &self.subject };
		let claims_json = serde_json::to_vec(&claims)
			.map_err(|e| Error::Signing(format!("JWT claims serialization failed: {}", e)))?;

		let signing_input = format!(
			"{}.{}",
			URL_SAFE_NO_PAD.encode(header_json),
			URL_SAFE_NO_PAD.encode(claims_json)
		);

		let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
		let raw = der_signature_to_raw(signature.to_der().as_bytes())?;

		Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(raw)))
	}
}

/// Convert a DER-encoded ECDSA signature into the fixed 64-byte `r || s`
/// form JWS ES256 requires.
///
/// DER wraps the signature as `SEQUENCE { INTEGER r, INTEGER s }` and
/// prepends a zero byte to a component whose high bit is set, so each
/// INTEGER is 1..=33 bytes long. The sign-padding zero of a 33-byte
/// component is stripped; shorter components are left-padded to 32 bytes.
pub fn der_signature_to_raw(der: &[u8]) -> AtResult<[u8; 64]> {
	if der.len() < 8 || der[0] != 0x30 {
		return Err(Error::Signing("not a DER ECDSA signature".into()));
	}
	// P-256 signatures fit in short-form lengths (total content < 128).
	if der[1] as usize != der.len() - 2 {
		return Err(Error::Signing("DER sequence length mismatch".into()));
	}

	let mut out = [0u8; 64];
	let mut pos = 2;
	for half in 0..2 {
		if der.get(pos) != Some(&0x02) {
			return Err(Error::Signing("missing DER INTEGER tag".into()));
		}
		let len = *der
			.get(pos + 1)
			.ok_or_else(|| Error::Signing("truncated DER signature".into()))? as usize;
		if len == 0 || len > 33 {
			return Err(Error::Signing(format!("DER INTEGER length {} out of range", len)));
		}
		let bytes = der
			.get(pos + 2..pos + 2 + len)
			.ok_or_else(|| Error::Signing("truncated DER signature".into()))?;
		let bytes = if bytes.len() == 33 {
			if bytes[0] != 0 {
				return Err(Error::Signing("33-byte DER INTEGER without sign padding".into()));
			}
			&bytes[1..]
		} else {
			bytes
		};

		let start = half * 32 + (32 - bytes.len());
		out[start..half * 32 + 32].copy_from_slice(bytes);
		pos += 2 + len;
	}

	if pos != der.len() {
		return Err(Error::Signing("trailing bytes after DER signature".into()));
	}
	Ok(out)
}

/// Audience origin (scheme + host, no path) of a subscription endpoint.
///
/// Push services compare the JWT `aud` claim against their own origin;
/// non-default ports are kept, paths are dropped.
pub fn audience_origin(endpoint: &str) -> AtResult<String> {
	let url = Url::parse(endpoint)
		.map_err(|e| Error::MalformedSubscription(format!("Invalid endpoint URL: {}", e)))?;
	let host = url
		.host_str()
		.ok_or_else(|| Error::MalformedSubscription("Endpoint URL has no host".into()))?;

	Ok(match url.port() {
		Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
		None => format!("{}://{}", url.scheme(), host),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use p256::ecdsa::signature::Verifier;

	fn test_config() -> VapidConfig {
		VapidConfig::generate("mailto:hr@attenda.dev").expect("generate keys")
	}

	#[test]
	fn test_der_to_raw_matches_library_raw_form() {
		// to_der() and to_bytes() encode the same signature; our converter
		// must map one onto the other, including the sign-padded cases that
		// show up randomly in roughly half of all signatures.
		let key = SigningKey::random(&mut OsRng);
		for i in 0..64u8 {
			let sig: Signature = key.sign(&[i]);
			let raw = der_signature_to_raw(sig.to_der().as_bytes()).expect("convert");
			assert_eq!(raw.as_slice(), sig.to_bytes().as_slice());
		}
	}

	#[test]
	fn test_der_to_raw_strips_sign_padding() {
		// r needs sign padding (33-byte INTEGER), s is short (4 bytes).
		let mut der = vec![0x30, 0x29, 0x02, 0x21, 0x00, 0x80];
		der.extend_from_slice(&[0x11; 31]);
		der.extend_from_slice(&[0x02, 0x04, 0x01, 0x02, 0x03, 0x04]);

		let raw = der_signature_to_raw(&der).expect("convert");

		let mut expected_r = [0u8; 32];
		expected_r[0] = 0x80;
		expected_r[1..].copy_from_slice(&[0x11; 31]);
		assert_eq!(&raw[..32], &expected_r);

		let mut expected_s = [0u8; 32];
		expected_s[28..].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
		assert_eq!(&raw[32..], &expected_s);
	}

	#[test]
	fn test_der_to_raw_rejects_garbage() {
		// Not a sequence.
		assert!(der_signature_to_raw(&[0x02, 0x20, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).is_err());
		// Missing INTEGER tag.
		let mut der = vec![0x30, 0x24, 0x03, 0x20];
		der.extend_from_slice(&[0x11; 32]);
		der.extend_from_slice(&[0x02, 0x00]);
		assert!(der_signature_to_raw(&der).is_err());
		// Component longer than 33 bytes.
		let mut der = vec![0x30, 0x28, 0x02, 0x22];
		der.extend_from_slice(&[0x11; 34]);
		der.extend_from_slice(&[0x02, 0x02, 0x01, 0x02]);
		assert!(der_signature_to_raw(&der).is_err());
		// Truncated.
		assert!(der_signature_to_raw(&[0x30, 0x26, 0x02, 0x21, 0x00]).is_err());
	}

	#[test]
	fn test_signed_jwt_verifies_with_public_key() {
		let config = test_config();
		let jwt = config.sign("https://push.example.net").expect("sign");

		let parts: Vec<&str> = jwt.split('.').collect();
		assert_eq!(parts.len(), 3);

		let raw = URL_SAFE_NO_PAD.decode(parts[2]).expect("decode signature");
		assert_eq!(raw.len(), 64);
		let signature = Signature::from_slice(&raw).expect("raw signature");

		let signing_input = format!("{}.{}", parts[0], parts[1]);
		let public = URL_SAFE_NO_PAD.decode(config.public_key_b64url()).expect("decode pub");
		let verifying_key =
			p256::ecdsa::VerifyingKey::from_sec1_bytes(&public).expect("verifying key");
		verifying_key.verify(signing_input.as_bytes(), &signature).expect("JWT must verify");
	}

	#[test]
	fn test_jwt_claims() {
		let config = test_config();
		let jwt = config.sign("https://push.example.net").expect("sign");
		let parts: Vec<&str> = jwt.split('.').collect();

		let header: serde_json::Value =
			serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
		assert_eq!(header["typ"], "JWT");
		assert_eq!(header["alg"], "ES256");

		let claims: serde_json::Value =
			serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
		assert_eq!(claims["aud"], "https://push.example.net");
		assert_eq!(claims["sub"], "mailto:hr@attenda.dev");

		let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
		let exp = claims["exp"].as_u64().unwrap();
		assert!(exp > now);
		assert!(exp <= now + JWT_EXPIRY_SECS);
	}

	#[test]
	fn test_from_base64url_roundtrip() {
		let generated = test_config();
		let reloaded = VapidConfig::from_base64url(
			generated.public_key_b64url(),
			&generated.private_key_b64url(),
			"mailto:hr@attenda.dev",
		)
		.expect("reload keys");
		assert_eq!(generated.public_key_b64url(), reloaded.public_key_b64url());
	}

	#[test]
	fn test_from_base64url_rejects_bad_material() {
		assert!(VapidConfig::from_base64url("!!!", "also-bad", "mailto:a@b").is_err());

		// Wrong public key length.
		let short = URL_SAFE_NO_PAD.encode([0x04; 33]);
		let priv_ok = test_config().private_key_b64url();
		assert!(VapidConfig::from_base64url(&short, &priv_ok, "mailto:a@b").is_err());

		// Mismatched pair.
		let a = test_config();
		let b = test_config();
		assert!(VapidConfig::from_base64url(
			a.public_key_b64url(),
			&b.private_key_b64url(),
			"mailto:a@b"
		)
		.is_err());

		// Empty subject.
		let c = test_config();
		assert!(
			VapidConfig::from_base64url(c.public_key_b64url(), &c.private_key_b64url(), "")
				.is_err()
		);
	}

	#[test]
	fn test_debug_does_not_leak_private_key() {
		let config = test_config();
		let debug = format!("{:?}", config);
		assert!(!debug.contains(&config.private_key_b64url()));
		assert!(debug.contains(config.public_key_b64url()));
	}

	#[test]
	fn test_audience_origin() {
		assert_eq!(
			audience_origin("https://fcm.googleapis.com/fcm/send/abc123").unwrap(),
			"https://fcm.googleapis.com"
		);
		assert_eq!(
			audience_origin("https://updates.push.services.mozilla.com/wpush/v2/x").unwrap(),
			"https://updates.push.services.mozilla.com"
		);
		// Non-default ports are part of the origin.
		assert_eq!(
			audience_origin("http://127.0.0.1:8080/push/1").unwrap(),
			"http://127.0.0.1:8080"
		);
		// Default ports are not.
		assert_eq!(
			audience_origin("https://push.example.net:443/x").unwrap(),
			"https://push.example.net"
		);
		assert!(audience_origin("not a url").is_err());
	}
}

// vim: ts=4
