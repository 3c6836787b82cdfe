#![forbid(unsafe_code)]
#![deny(missing_docs)]
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

//! Keystore for the anchor account seed.
//!
//! The anchor's private key is loaded once at server start and never
//! serialized. On disk the seed is protected with:
//! - **Atomic writes** for the key material.
//! - **Key-at-rest encryption** (optional) via `ANCHOR_KEY_PASSPHRASE`.
//!
//! ### Key encryption format
//! If `ANCHOR_KEY_PASSPHRASE` is set, `anchor.key` is stored as
//! `MAGIC(8) || SALT(16) || NONCE(12) || CIPHERTEXT+TAG(..)` where the
//! ciphertext is AES-256-GCM over the raw seed bytes.

use ring::{
    aead, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use std::{
    fs,
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
};
use thiserror::Error;
use zeroize::Zeroize;

use crate::core::account::Account;

fn env_passphrase() -> Option<String> {
    match std::env::var("ANCHOR_KEY_PASSPHRASE") {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

const KEY_FILE_MAGIC: &[u8] = b"ANCHKEY1"; // 8 bytes
const KEY_SALT_LEN: usize = 16;
const KEY_NONCE_LEN: usize = 12;
const SEED_LEN: usize = 32;

// PBKDF2 params: 100k iterations is a reasonable baseline for server-side
// passphrases.
const PBKDF2_ITERS_DEFAULT: u32 = 100_000;

fn pbkdf2_iters() -> NonZeroU32 {
    // Optional override via env, e.g. ANCHOR_PBKDF2_ITERS=300000.
    let iters = std::env::var("ANCHOR_PBKDF2_ITERS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(PBKDF2_ITERS_DEFAULT);

    let iters = iters.clamp(10_000, 10_000_000);
    NonZeroU32::new(iters).unwrap_or_else(|| NonZeroU32::new(PBKDF2_ITERS_DEFAULT).expect("nonzero"))
}

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// Key file bytes are not a usable seed.
    #[error("invalid key encoding")]
    InvalidKey,
    /// Key file is encrypted and no passphrase is set.
    #[error("missing passphrase (set ANCHOR_KEY_PASSPHRASE)")]
    MissingPassphrase,
    /// Key derivation or AEAD failure.
    #[error("crypto")]
    Crypto,
}

fn set_private_perms_best_effort(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
}

/// Atomic write to disk (best-effort fsync, then rename).
fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| KeystoreError::Io)?;
    }

    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");

    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| KeystoreError::Io)?;
        f.write_all(bytes).map_err(|_| KeystoreError::Io)?;
        let _ = f.sync_all();
    }

    set_private_perms_best_effort(&tmp);
    fs::rename(&tmp, path).map_err(|_| KeystoreError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

fn derive_aes256gcm_key(
    passphrase: &[u8],
    salt: &[u8; KEY_SALT_LEN],
) -> Result<[u8; 32], KeystoreError> {
    let mut out = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        pbkdf2_iters(),
        salt,
        passphrase,
        &mut out,
    );
    Ok(out)
}

fn encrypt_seed(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; KEY_SALT_LEN];
    rng.fill(&mut salt).map_err(|_| KeystoreError::Crypto)?;

    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| KeystoreError::Crypto)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_aes256gcm_key(passphrase, &salt)?;
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| KeystoreError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| KeystoreError::Crypto)?;

    key.zeroize();

    let mut out =
        Vec::with_capacity(KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN + in_out.len());
    out.extend_from_slice(KEY_FILE_MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

fn decrypt_seed(passphrase: &[u8], bytes: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    if bytes.len() < KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN + 16 {
        return Err(KeystoreError::InvalidKey);
    }

    let mut salt = [0u8; KEY_SALT_LEN];
    salt.copy_from_slice(&bytes[KEY_FILE_MAGIC.len()..KEY_FILE_MAGIC.len() + KEY_SALT_LEN]);
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    nonce_bytes.copy_from_slice(
        &bytes
            [KEY_FILE_MAGIC.len() + KEY_SALT_LEN..KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN],
    );
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_aes256gcm_key(passphrase, &salt)?;
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| KeystoreError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = bytes[KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN..].to_vec();
    let plain = less_safe
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| KeystoreError::Crypto)?;

    key.zeroize();
    Ok(plain.to_vec())
}

/// Load or create the anchor account seed in `data_dir/anchor.key`.
///
/// If `ANCHOR_KEY_PASSPHRASE` is set, the key file is encrypted at rest.
pub fn load_or_create(data_dir: &str) -> Result<Account, KeystoreError> {
    let mut key_path = PathBuf::from(data_dir);
    key_path.push("anchor.key");

    let pass = env_passphrase();

    if key_path.exists() {
        let bytes = fs::read(&key_path).map_err(|_| KeystoreError::Io)?;
        let mut seed = if bytes.starts_with(KEY_FILE_MAGIC) {
            let Some(p) = pass.as_deref() else {
                return Err(KeystoreError::MissingPassphrase);
            };
            decrypt_seed(p.as_bytes(), &bytes)?
        } else {
            bytes
        };
        if seed.len() != SEED_LEN {
            seed.zeroize();
            return Err(KeystoreError::InvalidKey);
        }
        let account = Account::from_seed_bytes(&seed, 0);
        seed.zeroize();
        return Ok(account);
    }

    let rng = SystemRandom::new();
    let mut seed = [0u8; SEED_LEN];
    rng.fill(&mut seed).map_err(|_| KeystoreError::Crypto)?;

    let on_disk = if let Some(p) = pass.as_deref() {
        encrypt_seed(p.as_bytes(), &seed)?
    } else {
        seed.to_vec()
    };
    atomic_write_private(&key_path, &on_disk)?;

    let account = Account::from_seed_bytes(&seed, 0);
    seed.zeroize();
    Ok(account)
}
