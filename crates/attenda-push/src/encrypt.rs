//! Web Push message encryption (RFC 8291) with aes128gcm content
//! encoding (RFC 8188)
//!
//! The derivation chain has to match the RFCs bit for bit: a push service
//! that cannot decrypt a record does not report an error, the message just
//! never reaches the device.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use hkdf::Hkdf;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use sha2::Sha256;

use crate::ecdh::{self, EphemeralKeyAgreement, PUBLIC_KEY_LEN};
use crate::prelude::*;

/// Content-encoding salt length.
pub const SALT_LEN: usize = 16;
/// Client auth secret length.
pub const AUTH_SECRET_LEN: usize = 16;
/// Record size advertised in the aes128gcm header.
pub const RECORD_SIZE: u32 = 4096;
/// AES-128-GCM authentication tag length.
const TAG_LEN: usize = 16;
/// `salt || rs || idlen || keyid` with the 65-byte server key as keyid.
const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;
/// RFC 8188 delimiter marking the final (and only) record.
const PAD_DELIMITER: u8 = 0x02;

/// What a single 4096-byte push message can carry once the header, the
/// delimiter byte and the GCM tag are accounted for.
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// A complete aes128gcm message body, ready to POST.
///
/// Layout: `salt[16] || rs[4,BE] || idlen[1]=65 || server_public[65] ||
/// ciphertext || tag[16]`. Produced fresh for every delivery attempt and
/// never persisted.
#[derive(Debug)]
pub struct EncryptedPushRecord {
	bytes: Vec<u8>,
}

impl EncryptedPushRecord {
	/// The full wire-format body.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Consume the record, yielding the wire-format body.
	pub fn into_vec(self) -> Vec<u8> {
		self.bytes
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// The per-message content-encoding salt.
	pub fn salt(&self) -> &[u8] {
		&self.bytes[..SALT_LEN]
	}

	/// The server's ephemeral public key carried in the `keyid` field.
	pub fn server_public_key(&self) -> &[u8] {
		&self.bytes[SALT_LEN + 5..HEADER_LEN]
	}
}

/// Encrypt a plaintext for one subscription (RFC 8291 §3).
///
/// `client_public_raw` is the subscription's `p256dh` key (65 raw bytes,
/// validated here), `auth_secret` its 16-byte `auth` secret. A fresh
/// ephemeral key pair and a fresh salt are generated on every call.
pub fn encrypt(
	client_public_raw: &[u8],
	auth_secret: &[u8; AUTH_SECRET_LEN],
	plaintext: &[u8],
) -> AtResult<EncryptedPushRecord> {
	if plaintext.len() > MAX_PLAINTEXT_LEN {
		return Err(Error::Encryption(format!(
			"plaintext of {} bytes exceeds the {} byte single-record limit",
			plaintext.len(),
			MAX_PLAINTEXT_LEN
		)));
	}

	let client_public = ecdh::decode_client_key(client_public_raw)?;
	let agreement = EphemeralKeyAgreement::generate()?;
	let server_public_raw = *agreement.public_key_raw();
	let shared_secret = agreement.derive_shared_secret(&client_public);

	// IKM = HKDF(salt=auth, ikm=ecdh, info="WebPush: info" || 0x00 || ua_public || as_public)
	let mut key_info = Vec::with_capacity(IKM_INFO_PREFIX.len() + 2 * PUBLIC_KEY_LEN);
	key_info.extend_from_slice(IKM_INFO_PREFIX);
	key_info.extend_from_slice(client_public_raw);
	key_info.extend_from_slice(&server_public_raw);
	let ikm = hkdf_sha256(auth_secret, &shared_secret, &key_info, 32)?;

	let mut salt = [0u8; SALT_LEN];
	OsRng.fill_bytes(&mut salt);

	let cek = hkdf_sha256(&salt, &ikm, CEK_INFO, 16)?;
	let nonce = hkdf_sha256(&salt, &ikm, NONCE_INFO, 12)?;

	let mut padded = Vec::with_capacity(plaintext.len() + 1);
	padded.extend_from_slice(plaintext);
	padded.push(PAD_DELIMITER);

	let cipher = Aes128Gcm::new_from_slice(&cek)
		.map_err(|_| Error::Encryption("invalid content encryption key length".into()))?;
	let ciphertext = cipher
		.encrypt(Nonce::from_slice(&nonce), padded.as_slice())
		.map_err(|_| Error::Encryption("AES-128-GCM encryption failed".into()))?;

	let mut bytes = Vec::with_capacity(HEADER_LEN + ciphertext.len());
	bytes.extend_from_slice(&salt);
	bytes.extend_from_slice(&RECORD_SIZE.to_be_bytes());
	bytes.push(PUBLIC_KEY_LEN as u8);
	bytes.extend_from_slice(&server_public_raw);
	bytes.extend_from_slice(&ciphertext);

	Ok(EncryptedPushRecord { bytes })
}

/// One-shot HKDF-SHA256 (RFC 5869), extract then expand.
fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> AtResult<Vec<u8>> {
	let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
	let mut okm = vec![0u8; len];
	hk.expand(info, &mut okm)
		.map_err(|_| Error::Encryption("HKDF expand failed".into()))?;
	Ok(okm)
}


// vim: ts=4
