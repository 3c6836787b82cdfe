// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Keypair accounts: Ed25519 signing plus X25519 asymmetric encryption.
//!
//! An account is the principal identity of the protocol. Full accounts hold
//! both private halves and can sign and decrypt; accounts recovered from a
//! public-key string can verify and encrypt-to; accounts recovered from a
//! bare signing key (e.g. a container signature block) can only verify.
//!
//! The asymmetric encryption operation is an ECIES construction: ephemeral
//! X25519 agreement, HKDF-SHA256 key derivation, AES-256-GCM sealing. The
//! wire form is `ephemeral_pub(32) || nonce(12) || ciphertext+tag`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use crate::core::errors::Error;

/// Textual public-key prefix.
pub const PUBLIC_KEY_PREFIX: &str = "anchor_";

const KEY_STRING_VERSION: u8 = 1;
const CHECKSUM_LEN: usize = 4;
const ECIES_NONCE_LEN: usize = 12;
const ECIES_TAG_LEN: usize = 16;

const DERIVE_SALT: &[u8] = b"anchorstore/account/v1";
const DERIVE_INFO_SIGN: &[u8] = b"sign";
const DERIVE_INFO_ENCRYPT: &[u8] = b"encrypt";
const ECIES_INFO: &[u8] = b"anchorstore/ecies/v1";

struct AccountSecret {
    signing: SigningKey,
    encryption: StaticSecret,
}

impl Clone for AccountSecret {
    fn clone(&self) -> Self {
        Self {
            signing: self.signing.clone(),
            encryption: self.encryption.clone(),
        }
    }
}

/// A protocol account. See the module docs for the capability tiers.
#[derive(Clone)]
pub struct Account {
    signing_public: VerifyingKey,
    encryption_public: Option<X25519Public>,
    secret: Option<AccountSecret>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("public_key", &self.public_key_string())
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}

impl Account {
    /// Derive a full account deterministically from a hex seed and an index.
    pub fn from_seed(seed_hex: &str, index: u32) -> Result<Self, Error> {
        let seed = hex::decode(seed_hex.trim())
            .map_err(|_| Error::InvalidArgument("seed is not valid hex".into()))?;
        if seed.is_empty() {
            return Err(Error::InvalidArgument("seed must not be empty".into()));
        }
        Ok(Self::from_seed_bytes(&seed, index))
    }

    /// Derive a full account from raw seed bytes and an index.
    pub fn from_seed_bytes(seed: &[u8], index: u32) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(DERIVE_SALT), seed);

        let mut info = Vec::with_capacity(DERIVE_INFO_SIGN.len() + 4);
        info.extend_from_slice(DERIVE_INFO_SIGN);
        info.extend_from_slice(&index.to_be_bytes());
        let mut sign_seed = Zeroizing::new([0u8; 32]);
        hk.expand(&info, sign_seed.as_mut())
            .expect("32 bytes is a valid hkdf output length");

        info.clear();
        info.extend_from_slice(DERIVE_INFO_ENCRYPT);
        info.extend_from_slice(&index.to_be_bytes());
        let mut enc_seed = Zeroizing::new([0u8; 32]);
        hk.expand(&info, enc_seed.as_mut())
            .expect("32 bytes is a valid hkdf output length");

        let signing = SigningKey::from_bytes(&sign_seed);
        let encryption = StaticSecret::from(*enc_seed);
        let signing_public = signing.verifying_key();
        let encryption_public = X25519Public::from(&encryption);

        Self {
            signing_public,
            encryption_public: Some(encryption_public),
            secret: Some(AccountSecret { signing, encryption }),
        }
    }

    /// Generate a fresh random account.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(seed.as_mut());
        Self::from_seed_bytes(seed.as_ref(), 0)
    }

    /// Recover a public account from its canonical string form.
    pub fn from_public_key_string(s: &str) -> Result<Self, Error> {
        let encoded = s
            .strip_prefix(PUBLIC_KEY_PREFIX)
            .ok_or_else(|| Error::InvalidArgument("missing public key prefix".into()))?;
        let payload = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| Error::InvalidArgument("public key is not valid base58".into()))?;
        let full = payload.len() == 1 + 64 + CHECKSUM_LEN;
        if !full && payload.len() != 1 + 32 + CHECKSUM_LEN {
            return Err(Error::InvalidArgument("public key has wrong length".into()));
        }
        if payload[0] != KEY_STRING_VERSION {
            return Err(Error::InvalidArgument("unknown public key version".into()));
        }
        let (body, checksum) = payload.split_at(payload.len() - CHECKSUM_LEN);
        if key_checksum(body) != checksum {
            return Err(Error::InvalidArgument("public key checksum mismatch".into()));
        }

        let mut sign_bytes = [0u8; 32];
        sign_bytes.copy_from_slice(&body[1..33]);
        let signing_public = VerifyingKey::from_bytes(&sign_bytes)
            .map_err(|_| Error::InvalidArgument("invalid signing key".into()))?;

        let encryption_public = if full {
            let mut enc_bytes = [0u8; 32];
            enc_bytes.copy_from_slice(&body[33..65]);
            Some(X25519Public::from(enc_bytes))
        } else {
            None
        };

        Ok(Self {
            signing_public,
            encryption_public,
            secret: None,
        })
    }

    /// Recover a public account from the raw stable key bytes
    /// (ed25519(32) || x25519(32), or a bare 32-byte signing key).
    pub fn from_public_key_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.len() {
            64 => {
                let mut account = Self::from_signing_public_key(&bytes[..32])?;
                let mut enc_bytes = [0u8; 32];
                enc_bytes.copy_from_slice(&bytes[32..]);
                account.encryption_public = Some(X25519Public::from(enc_bytes));
                Ok(account)
            }
            32 => Self::from_signing_public_key(bytes),
            _ => Err(Error::InvalidArgument("public key must be 32 or 64 bytes".into())),
        }
    }

    /// Recover a verify-only account from a raw Ed25519 public key.
    ///
    /// Such accounts carry no encryption half and cannot be container
    /// principals.
    pub fn from_signing_public_key(bytes: &[u8]) -> Result<Self, Error> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("signing key must be 32 bytes".into()))?;
        let signing_public = VerifyingKey::from_bytes(&arr)
            .map_err(|_| Error::InvalidArgument("invalid signing key".into()))?;
        Ok(Self {
            signing_public,
            encryption_public: None,
            secret: None,
        })
    }

    /// Raw stable public-key bytes: ed25519(32) || x25519(32), or just the
    /// signing key for verify-only accounts.
    pub fn public_key(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(self.signing_public.as_bytes());
        if let Some(enc) = &self.encryption_public {
            out.extend_from_slice(enc.as_bytes());
        }
        out
    }

    /// Canonical textual public key: versioned, checksummed base58.
    pub fn public_key_string(&self) -> String {
        let mut body = Vec::with_capacity(1 + 64);
        body.push(KEY_STRING_VERSION);
        body.extend_from_slice(self.signing_public.as_bytes());
        if let Some(enc) = &self.encryption_public {
            body.extend_from_slice(enc.as_bytes());
        }
        let checksum = key_checksum(&body);
        body.extend_from_slice(&checksum);
        format!("{}{}", PUBLIC_KEY_PREFIX, bs58::encode(body).into_string())
    }

    /// Whether this account holds its private halves.
    pub fn has_private_key(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether this account can be encrypted to.
    pub fn has_encryption_key(&self) -> bool {
        self.encryption_public.is_some()
    }

    /// Sign a message. Requires the private key.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, Error> {
        let secret = self.secret.as_ref().ok_or(Error::PrivateKeyRequired)?;
        Ok(secret.signing.sign(msg).to_bytes().to_vec())
    }

    /// Verify a signature over a message.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let Ok(sig) = Signature::from_slice(sig) else {
            return false;
        };
        self.signing_public.verify(msg, &sig).is_ok()
    }

    /// Asymmetrically encrypt to this account (public-key operation).
    pub fn encrypt_to(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let recipient = self.encryption_public.as_ref().ok_or(Error::NoEncryption)?;

        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = X25519Public::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(recipient);

        let key = ecies_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|_| Error::Internal("aead key setup".into()))?;

        let mut nonce_bytes = [0u8; ECIES_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| Error::Internal("aead seal".into()))?;

        let mut out = Vec::with_capacity(32 + ECIES_NONCE_LEN + sealed.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt a ciphertext produced by [`Account::encrypt_to`]. Requires the
    /// private key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let secret = self.secret.as_ref().ok_or(Error::PrivateKeyRequired)?;
        let recipient = self.encryption_public.as_ref().ok_or(Error::NoEncryption)?;

        if ciphertext.len() < 32 + ECIES_NONCE_LEN + ECIES_TAG_LEN {
            return Err(Error::DecryptionFailed);
        }
        let mut eph_bytes = [0u8; 32];
        eph_bytes.copy_from_slice(&ciphertext[..32]);
        let ephemeral_public = X25519Public::from(eph_bytes);
        let nonce = Nonce::from_slice(&ciphertext[32..32 + ECIES_NONCE_LEN]);
        let sealed = &ciphertext[32 + ECIES_NONCE_LEN..];

        let shared = secret.encryption.diffie_hellman(&ephemeral_public);
        if !shared.was_contributory() {
            return Err(Error::DecryptionFailed);
        }

        let key = ecies_key(shared.as_bytes(), &eph_bytes, recipient.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|_| Error::Internal("aead key setup".into()))?;

        cipher
            .decrypt(nonce, sealed)
            .map_err(|_| Error::DecryptionFailed)
    }

    /// Constant-time comparison of the stable public-key bytes.
    pub fn compare_public_key(&self, other: &Account) -> bool {
        let a = self.public_key();
        let b = other.public_key();
        if a.len() != b.len() {
            return false;
        }
        a.ct_eq(&b).into()
    }
}

fn key_checksum(body: &[u8]) -> Vec<u8> {
    let digest = Sha3_256::digest(body);
    digest[..CHECKSUM_LEN].to_vec()
}

fn ecies_key(shared: &[u8], ephemeral_pub: &[u8], recipient_pub: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut salt = Vec::with_capacity(64);
    salt.extend_from_slice(ephemeral_pub);
    salt.extend_from_slice(recipient_pub);
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(ECIES_INFO, key.as_mut())
        .expect("32 bytes is a valid hkdf output length");
    key
}
