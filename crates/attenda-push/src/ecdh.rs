//! Per-message ephemeral ECDH key agreement over P-256
//!
//! Every encrypted message gets its own ephemeral server key pair. Reusing
//! a key pair across messages or recipients would break forward secrecy and
//! let a push service correlate messages.

use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;

use crate::prelude::*;

/// Uncompressed SEC1 P-256 point length (`0x04 || x || y`).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Shared secret length (the x-coordinate of the ECDH product).
pub const SHARED_SECRET_LEN: usize = 32;

/// Server side of one message's key agreement.
pub struct EphemeralKeyAgreement {
	secret: EphemeralSecret,
	public_raw: [u8; PUBLIC_KEY_LEN],
}

impl EphemeralKeyAgreement {
	/// Generate a fresh ephemeral key pair.
	pub fn generate() -> AtResult<Self> {
		let secret = EphemeralSecret::random(&mut OsRng);
		let public = PublicKey::from(&secret);
		let point = public.to_encoded_point(false);
		let public_raw: [u8; PUBLIC_KEY_LEN] = point
			.as_bytes()
			.try_into()
			.map_err(|_| Error::KeyAgreement("unexpected ephemeral public key length".into()))?;

		Ok(Self { secret, public_raw })
	}

	/// The server's ephemeral public key, uncompressed SEC1.
	pub fn public_key_raw(&self) -> &[u8; PUBLIC_KEY_LEN] {
		&self.public_raw
	}

	/// ECDH scalar multiplication with the client's public key; output is
	/// the raw 32-byte x-coordinate.
	///
	/// Consumes the key pair: it must not outlive the one message it was
	/// generated for.
	pub fn derive_shared_secret(self, client_public: &PublicKey) -> [u8; SHARED_SECRET_LEN] {
		let shared = self.secret.diffie_hellman(client_public);
		let mut out = [0u8; SHARED_SECRET_LEN];
		out.copy_from_slice(shared.raw_secret_bytes().as_slice());
		out
	}
}

/// Decode and validate a client `p256dh` key.
///
/// Must be exactly 65 raw bytes, carry the `0x04` uncompressed-point
/// prefix, and decode to a point actually on curve P-256. The last check
/// guards against invalid-curve attacks: an off-curve point would leak
/// information about the ephemeral scalar.
pub fn decode_client_key(raw: &[u8]) -> AtResult<PublicKey> {
	if raw.len() != PUBLIC_KEY_LEN {
		return Err(Error::KeyAgreement(format!(
			"client public key must be {} bytes, got {}",
			PUBLIC_KEY_LEN,
			raw.len()
		)));
	}
	if raw[0] != 0x04 {
		return Err(Error::KeyAgreement(
			"client public key must be an uncompressed SEC1 point".into(),
		));
	}
	PublicKey::from_sec1_bytes(raw)
		.map_err(|_| Error::KeyAgreement("client public key is not on curve P-256".into()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use p256::SecretKey;

	fn client_key_raw() -> Vec<u8> {
		let secret = SecretKey::random(&mut OsRng);
		secret.public_key().to_encoded_point(false).as_bytes().to_vec()
	}

	#[test]
	fn test_decode_valid_key() {
		let raw = client_key_raw();
		assert!(decode_client_key(&raw).is_ok());
	}

	#[test]
	fn test_decode_rejects_wrong_length() {
		// A 64-byte key, e.g. a coordinate pair stored without the 0x04
		// prefix, must be rejected before any curve arithmetic.
		let raw = client_key_raw();
		assert!(matches!(decode_client_key(&raw[1..]), Err(Error::KeyAgreement(_))));
		assert!(matches!(decode_client_key(&[]), Err(Error::KeyAgreement(_))));
	}

	#[test]
	fn test_decode_rejects_wrong_prefix() {
		let mut raw = client_key_raw();
		raw[0] = 0x02;
		assert!(matches!(decode_client_key(&raw), Err(Error::KeyAgreement(_))));
	}

	#[test]
	fn test_decode_rejects_off_curve_point() {
		let mut raw = client_key_raw();
		// Corrupt the y-coordinate; the point almost surely leaves the curve.
		raw[64] ^= 0x01;
		assert!(matches!(decode_client_key(&raw), Err(Error::KeyAgreement(_))));
	}

	#[test]
	fn test_shared_secret_matches_client_side() {
		let client_secret = SecretKey::random(&mut OsRng);
		let client_public_raw =
			client_secret.public_key().to_encoded_point(false).as_bytes().to_vec();

		let agreement = EphemeralKeyAgreement::generate().unwrap();
		let server_public =
			PublicKey::from_sec1_bytes(agreement.public_key_raw()).unwrap();

		let client_public = decode_client_key(&client_public_raw).unwrap();
		let server_side = agreement.derive_shared_secret(&client_public);

		let client_side = p256::ecdh::diffie_hellman(
			client_secret.to_nonzero_scalar(),
			server_public.as_affine(),
		);
		assert_eq!(server_side.as_slice(), client_side.raw_secret_bytes().as_slice());
	}

	#[test]
	fn test_fresh_key_pair_every_time() {
		let a = EphemeralKeyAgreement::generate().unwrap();
		let b = EphemeralKeyAgreement::generate().unwrap();
		assert_ne!(a.public_key_raw(), b.public_key_raw());
	}
}

// vim: ts=4
