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

//! The encrypted container: a self-describing DER envelope holding
//! zlib-compressed plaintext encrypted to a set of principals.
//!
//! Wire shape (DER, canonical):
//!
//! ```text
//! Container ::= SEQUENCE {
//!   version    INTEGER,                -- 1
//!   body       [0] Encrypted | [1] Plaintext,
//!   signature  SignatureBlock OPTIONAL
//! }
//! Plaintext      ::= SEQUENCE { compressed OCTET STRING }
//! Encrypted      ::= SEQUENCE { keys SEQUENCE OF PrincipalKey,
//!                               iv   OCTET STRING,
//!                               ct   OCTET STRING }
//! PrincipalKey   ::= SEQUENCE { publicKey BIT STRING,
//!                               encryptedKey BIT STRING }
//! SignatureBlock ::= SEQUENCE { signerPublicKey BIT STRING,
//!                               algorithm OBJECT IDENTIFIER,
//!                               signature OCTET STRING }
//! ```
//!
//! Every principal's `encryptedKey` wraps the same 32-byte symmetric key.
//! The optional signature covers the DER bytes of the tagged body element.

use std::io::{Read, Write};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::core::account::Account;
use crate::core::asn1::{self, Oid, Value};
use crate::core::errors::Error;

type CbcEnc = cbc::Encryptor<aes::Aes256>;
type CbcDec = cbc::Decryptor<aes::Aes256>;

/// Current container format version.
pub const CONTAINER_VERSION: i64 = 1;

const TAG_ENCRYPTED: u8 = 0;
const TAG_PLAINTEXT: u8 = 1;
const SYM_KEY_LEN: usize = 32;
const GCM_TAG_LEN: usize = 16;

// Inflation guard for hostile containers.
const MAX_PLAINTEXT_LEN: u64 = 256 * 1024 * 1024;

/// Symmetric cipher for the container body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cipher {
    /// AES-256-CBC with PKCS#7 padding, 16-byte IV.
    Aes256Cbc,
    /// AES-256-GCM, 12-byte nonce, 16-byte tag appended to the ciphertext.
    Aes256Gcm,
}

impl Cipher {
    /// IV length on the wire; also how the decoder tells the ciphers apart.
    pub fn iv_len(&self) -> usize {
        match self {
            Cipher::Aes256Cbc => 16,
            Cipher::Aes256Gcm => 12,
        }
    }

    /// Pinned algorithm identifier.
    pub fn oid(&self) -> Oid {
        let arcs = match self {
            Cipher::Aes256Cbc => asn1::AES_256_CBC_ARCS,
            Cipher::Aes256Gcm => asn1::AES_256_GCM_ARCS,
        };
        Oid::from_arcs(arcs).expect("pinned arcs are valid")
    }

    fn from_iv_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Cipher::Aes256Cbc),
            12 => Some(Cipher::Aes256Gcm),
            _ => None,
        }
    }
}

impl Default for Cipher {
    fn default() -> Self {
        Cipher::Aes256Cbc
    }
}

/// Build options for [`Container::from_plaintext`].
#[derive(Default)]
pub struct ContainerOptions {
    /// Sign the body with this account.
    pub signer: Option<Account>,
    /// Refuse to emit an unencrypted body.
    pub locked: bool,
    /// Symmetric cipher.
    pub cipher: Cipher,
}

#[derive(Clone)]
struct Principal {
    public_key: Vec<u8>,
    encrypted_key: Vec<u8>,
}

#[derive(Clone)]
struct SignatureBlock {
    signer_public_key: Vec<u8>,
    algorithm: Oid,
    signature: Vec<u8>,
}

/// A decoded or under-construction container.
pub struct Container {
    version: i64,
    encrypted: bool,
    cipher: Cipher,
    principals: Vec<Principal>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    plaintext: Option<Zeroizing<Vec<u8>>>,
    sym_key: Option<Zeroizing<[u8; SYM_KEY_LEN]>>,
    plaintext_disabled: bool,
    signer: Option<Account>,
    signature: Option<SignatureBlock>,
    decrypt_candidate: Option<Account>,
}

impl Container {
    /// Build a container from plaintext.
    ///
    /// With no principals (and `locked` unset) the body stays unencrypted.
    /// Otherwise a fresh symmetric key is generated and wrapped for every
    /// principal in insertion order.
    pub fn from_plaintext(
        plaintext: &[u8],
        principals: &[Account],
        options: ContainerOptions,
    ) -> Result<Self, Error> {
        if let Some(signer) = &options.signer {
            if !signer.has_private_key() {
                return Err(Error::PrivateKeyRequired);
            }
        }
        if principals.is_empty() && options.locked {
            return Err(Error::InvalidArgument(
                "a locked container needs at least one principal".into(),
            ));
        }

        let mut container = Self {
            version: CONTAINER_VERSION,
            encrypted: !principals.is_empty(),
            cipher: options.cipher,
            principals: Vec::new(),
            iv: Vec::new(),
            ciphertext: Vec::new(),
            plaintext: Some(Zeroizing::new(plaintext.to_vec())),
            sym_key: None,
            plaintext_disabled: false,
            signer: options.signer,
            signature: None,
            decrypt_candidate: None,
        };

        if container.encrypted {
            let mut key = Zeroizing::new([0u8; SYM_KEY_LEN]);
            OsRng.fill_bytes(key.as_mut());
            for account in principals {
                if !account.has_encryption_key() {
                    return Err(Error::NoEncryption);
                }
                container.principals.push(Principal {
                    public_key: account.public_key(),
                    encrypted_key: account.encrypt_to(key.as_ref())?,
                });
            }
            container.sym_key = Some(key);
            container.refresh_ciphertext()?;
        }

        Ok(container)
    }

    /// Parse an encoded container, plaintext or encrypted. For encrypted
    /// bodies, the first candidate holding a private key that matches a
    /// principal entry becomes the decryption account.
    pub fn from_encoded(bytes: &[u8], candidates: &[Account]) -> Result<Self, Error> {
        let root = asn1::decode(bytes)?;
        let fields = root
            .as_sequence()
            .ok_or_else(|| Error::SchemaMismatch("container is not a sequence".into()))?;
        if fields.len() < 2 || fields.len() > 3 {
            return Err(Error::SchemaMismatch("container arity".into()));
        }

        let version = fields[0]
            .as_integer()
            .ok_or_else(|| Error::SchemaMismatch("version is not an integer".into()))?;
        if version != CONTAINER_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let (tag, body) = fields[1]
            .as_tagged()
            .ok_or_else(|| Error::SchemaMismatch("body is not tagged".into()))?;

        let signature = match fields.get(2) {
            Some(value) => Some(parse_signature_block(value)?),
            None => None,
        };

        let mut container = match tag {
            TAG_PLAINTEXT => {
                let compressed = plaintext_body(body)?;
                let plaintext = inflate(compressed)?;
                Self {
                    version,
                    encrypted: false,
                    cipher: Cipher::default(),
                    principals: Vec::new(),
                    iv: Vec::new(),
                    ciphertext: Vec::new(),
                    plaintext: Some(Zeroizing::new(plaintext)),
                    sym_key: None,
                    plaintext_disabled: false,
                    signer: None,
                    signature,
                    decrypt_candidate: None,
                }
            }
            TAG_ENCRYPTED => {
                let (principals, iv, ciphertext) = encrypted_body(body)?;
                let cipher = Cipher::from_iv_len(iv.len())
                    .ok_or_else(|| Error::SchemaMismatch("unrecognized iv length".into()))?;
                Self {
                    version,
                    encrypted: true,
                    cipher,
                    principals,
                    iv,
                    ciphertext,
                    plaintext: None,
                    sym_key: None,
                    plaintext_disabled: false,
                    signer: None,
                    signature,
                    decrypt_candidate: None,
                }
            }
            other => {
                return Err(Error::SchemaMismatch(format!("unknown body tag {other}")));
            }
        };

        if container.encrypted {
            container.decrypt_candidate = candidates
                .iter()
                .find(|account| {
                    account.has_private_key()
                        && container
                            .principals
                            .iter()
                            .any(|p| p.public_key == account.public_key())
                })
                .cloned();
        }

        Ok(container)
    }

    /// Parse an encoded container and require it to be encrypted.
    pub fn from_encrypted(bytes: &[u8], candidates: &[Account]) -> Result<Self, Error> {
        let container = Self::from_encoded(bytes, candidates)?;
        if !container.encrypted {
            return Err(Error::NotEncrypted);
        }
        Ok(container)
    }

    /// Container format version.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Whether the body is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Cipher of the encrypted body.
    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Raw public keys of all principals, in wire order.
    pub fn principal_public_keys(&self) -> Vec<Vec<u8>> {
        self.principals.iter().map(|p| p.public_key.clone()).collect()
    }

    /// Whether the account holds a principal entry.
    pub fn has_principal(&self, account: &Account) -> bool {
        let key = account.public_key();
        self.principals.iter().any(|p| p.public_key == key)
    }

    /// Return a fresh copy of the plaintext, decrypting if needed.
    pub fn plaintext(&self) -> Result<Vec<u8>, Error> {
        if self.plaintext_disabled {
            return Err(Error::PlaintextDisabled);
        }
        if let Some(pt) = &self.plaintext {
            return Ok(pt.to_vec());
        }
        let key = self.unwrap_sym_key()?;
        let compressed = self.decipher(&key)?;
        inflate(&compressed)
    }

    /// Replace the plaintext. The symmetric key is kept; a fresh IV is drawn
    /// and the body re-encrypts immediately.
    pub fn set_plaintext(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        if self.plaintext_disabled {
            return Err(Error::PlaintextDisabled);
        }
        if self.encrypted && self.sym_key.is_none() {
            // Parsed container: recover the key before replacing content.
            let key = self.unwrap_sym_key()?;
            self.sym_key = Some(key);
        }
        self.plaintext = Some(Zeroizing::new(plaintext.to_vec()));
        self.signature = None;
        if self.encrypted {
            self.refresh_ciphertext()?;
        }
        Ok(())
    }

    /// Erase the symmetric key and plaintext from memory. Subsequent
    /// plaintext access fails; the encoded form stays intact.
    pub fn disable_plaintext(&mut self) {
        self.plaintext = None;
        self.sym_key = None;
        self.decrypt_candidate = None;
        self.plaintext_disabled = true;
    }

    /// Wrap the symmetric key for an additional principal.
    pub fn grant_access(&mut self, account: &Account) -> Result<(), Error> {
        if !self.encrypted {
            return Err(Error::NotEncrypted);
        }
        if !account.has_encryption_key() {
            return Err(Error::NoEncryption);
        }
        if self.has_principal(account) {
            return Ok(());
        }
        let key = self.unwrap_sym_key()?;
        let encrypted_key = account.encrypt_to(key.as_ref())?;
        self.principals.push(Principal {
            public_key: account.public_key(),
            encrypted_key,
        });
        self.signature = None;
        Ok(())
    }

    /// Remove a principal and re-encrypt under a fresh symmetric key so the
    /// revoked account cannot use a retained copy of the old key.
    pub fn revoke_access(&mut self, account: &Account) -> Result<(), Error> {
        if !self.encrypted {
            return Err(Error::NotEncrypted);
        }
        let target = account.public_key();
        let index = self
            .principals
            .iter()
            .position(|p| p.public_key == target)
            .ok_or(Error::NoMatchingKey)?;
        if self.principals.len() == 1 {
            return Err(Error::CannotRevokeLast);
        }

        let plaintext = self.plaintext()?;
        self.principals.remove(index);

        let mut key = Zeroizing::new([0u8; SYM_KEY_LEN]);
        OsRng.fill_bytes(key.as_mut());
        for principal in &mut self.principals {
            let holder = Account::from_public_key_bytes(&principal.public_key)?;
            principal.encrypted_key = holder.encrypt_to(key.as_ref())?;
        }
        self.sym_key = Some(key);
        self.plaintext = Some(Zeroizing::new(plaintext));
        self.signature = None;
        self.refresh_ciphertext()?;
        Ok(())
    }

    /// Encode to canonical DER. Deterministic: repeated calls yield
    /// byte-identical output while the key, IV, and plaintext are unchanged.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let body = self.body_value()?;
        let mut fields = vec![Value::Integer(self.version), body];

        if let Some(signer) = &self.signer {
            let body_bytes = asn1::encode(&fields[1]);
            let signature = signer.sign(&body_bytes)?;
            fields.push(signature_block_value(&SignatureBlock {
                signer_public_key: signer.public_key(),
                algorithm: Oid::from_arcs(asn1::ED25519_ARCS).expect("pinned arcs are valid"),
                signature,
            }));
        } else if let Some(block) = &self.signature {
            fields.push(signature_block_value(block));
        }

        Ok(asn1::encode(&Value::Sequence(fields)))
    }

    /// Verify the signature block against the body bytes, if present.
    pub fn verify_signature(&self) -> bool {
        let block = match (&self.signer, &self.signature) {
            // A pending signer signs at encode time; treat as valid.
            (Some(_), _) => return true,
            (None, Some(block)) => block,
            (None, None) => return false,
        };
        let Ok(body) = self.body_value() else {
            return false;
        };
        let Ok(signer) = Account::from_public_key_bytes(&block.signer_public_key) else {
            return false;
        };
        signer.verify(&asn1::encode(&body), &block.signature)
    }

    /// The signing account, when a signature block is present.
    pub fn signing_account(&self) -> Option<Account> {
        if let Some(signer) = &self.signer {
            return Some(signer.clone());
        }
        let block = self.signature.as_ref()?;
        Account::from_public_key_bytes(&block.signer_public_key).ok()
    }

    fn body_value(&self) -> Result<Value, Error> {
        if !self.encrypted {
            let pt = self
                .plaintext
                .as_ref()
                .ok_or(Error::PlaintextDisabled)?;
            let compressed = deflate(pt)?;
            return Ok(Value::Tagged(
                TAG_PLAINTEXT,
                Box::new(Value::Sequence(vec![Value::OctetString(compressed)])),
            ));
        }

        let keys = self
            .principals
            .iter()
            .map(|p| {
                Value::Sequence(vec![
                    Value::BitString(p.public_key.clone()),
                    Value::BitString(p.encrypted_key.clone()),
                ])
            })
            .collect::<Vec<_>>();
        Ok(Value::Tagged(
            TAG_ENCRYPTED,
            Box::new(Value::Sequence(vec![
                Value::Sequence(keys),
                Value::OctetString(self.iv.clone()),
                Value::OctetString(self.ciphertext.clone()),
            ])),
        ))
    }

    /// Re-encrypt the current plaintext under the held key with a fresh IV.
    fn refresh_ciphertext(&mut self) -> Result<(), Error> {
        let key = self
            .sym_key
            .as_ref()
            .ok_or(Error::PlaintextDisabled)?;
        let pt = self
            .plaintext
            .as_ref()
            .ok_or(Error::PlaintextDisabled)?;
        let compressed = deflate(pt)?;

        let mut iv = vec![0u8; self.cipher.iv_len()];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = match self.cipher {
            Cipher::Aes256Cbc => {
                let enc = CbcEnc::new_from_slices(&key[..], &iv)
                    .map_err(|_| Error::Internal("cipher setup".into()))?;
                enc.encrypt_padded_vec_mut::<Pkcs7>(&compressed)
            }
            Cipher::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&key[..])
                    .map_err(|_| Error::Internal("aead key setup".into()))?;
                cipher
                    .encrypt(Nonce::from_slice(&iv), compressed.as_slice())
                    .map_err(|_| Error::Internal("aead seal".into()))?
            }
        };

        self.iv = iv;
        self.ciphertext = ciphertext;
        Ok(())
    }

    /// Recover the symmetric key through the selected candidate account.
    fn unwrap_sym_key(&self) -> Result<Zeroizing<[u8; SYM_KEY_LEN]>, Error> {
        if self.plaintext_disabled {
            return Err(Error::PlaintextDisabled);
        }
        if let Some(key) = &self.sym_key {
            return Ok(key.clone());
        }
        let candidate = self.decrypt_candidate.as_ref().ok_or(Error::NoMatchingKey)?;
        let candidate_key = candidate.public_key();
        let principal = self
            .principals
            .iter()
            .find(|p| p.public_key == candidate_key)
            .ok_or(Error::NoMatchingKey)?;
        let raw = Zeroizing::new(candidate.decrypt(&principal.encrypted_key)?);
        if raw.len() != SYM_KEY_LEN {
            return Err(Error::DecryptionFailed);
        }
        let mut key = Zeroizing::new([0u8; SYM_KEY_LEN]);
        key.copy_from_slice(&raw);
        Ok(key)
    }

    /// Decrypt the stored ciphertext to the compressed plaintext.
    fn decipher(&self, key: &[u8; SYM_KEY_LEN]) -> Result<Vec<u8>, Error> {
        match self.cipher {
            Cipher::Aes256Cbc => {
                let dec = CbcDec::new_from_slices(&key[..], &self.iv)
                    .map_err(|_| Error::DecryptionFailed)?;
                dec.decrypt_padded_vec_mut::<Pkcs7>(&self.ciphertext)
                    .map_err(|_| Error::DecryptionFailed)
            }
            Cipher::Aes256Gcm => {
                if self.ciphertext.len() < GCM_TAG_LEN {
                    return Err(Error::DecryptionFailed);
                }
                let cipher = Aes256Gcm::new_from_slice(&key[..])
                    .map_err(|_| Error::Internal("aead key setup".into()))?;
                cipher
                    .decrypt(Nonce::from_slice(&self.iv), self.ciphertext.as_slice())
                    .map_err(|_| Error::DecryptionFailed)
            }
        }
    }
}

fn plaintext_body(body: &Value) -> Result<&[u8], Error> {
    let fields = body
        .as_sequence()
        .ok_or_else(|| Error::SchemaMismatch("plaintext body is not a sequence".into()))?;
    if fields.len() != 1 {
        return Err(Error::SchemaMismatch("plaintext body arity".into()));
    }
    fields[0]
        .as_octet_string()
        .ok_or_else(|| Error::SchemaMismatch("compressed data is not an octet string".into()))
}

fn encrypted_body(body: &Value) -> Result<(Vec<Principal>, Vec<u8>, Vec<u8>), Error> {
    let fields = body
        .as_sequence()
        .ok_or_else(|| Error::SchemaMismatch("encrypted body is not a sequence".into()))?;
    if fields.len() != 3 {
        return Err(Error::SchemaMismatch("encrypted body arity".into()));
    }

    let key_items = fields[0]
        .as_sequence()
        .ok_or_else(|| Error::SchemaMismatch("principal keys are not a sequence".into()))?;
    if key_items.is_empty() {
        return Err(Error::SchemaMismatch("encrypted body without principals".into()));
    }
    let mut principals = Vec::with_capacity(key_items.len());
    for item in key_items {
        let pair = item
            .as_sequence()
            .ok_or_else(|| Error::SchemaMismatch("principal entry is not a sequence".into()))?;
        if pair.len() != 2 {
            return Err(Error::SchemaMismatch("principal entry arity".into()));
        }
        let public_key = pair[0]
            .as_bit_string()
            .ok_or_else(|| Error::SchemaMismatch("principal key is not a bit string".into()))?;
        let encrypted_key = pair[1]
            .as_bit_string()
            .ok_or_else(|| Error::SchemaMismatch("wrapped key is not a bit string".into()))?;
        principals.push(Principal {
            public_key: public_key.to_vec(),
            encrypted_key: encrypted_key.to_vec(),
        });
    }

    let iv = fields[1]
        .as_octet_string()
        .ok_or_else(|| Error::SchemaMismatch("iv is not an octet string".into()))?;
    let ciphertext = fields[2]
        .as_octet_string()
        .ok_or_else(|| Error::SchemaMismatch("ciphertext is not an octet string".into()))?;

    Ok((principals, iv.to_vec(), ciphertext.to_vec()))
}

fn parse_signature_block(value: &Value) -> Result<SignatureBlock, Error> {
    let fields = value
        .as_sequence()
        .ok_or_else(|| Error::SchemaMismatch("signature block is not a sequence".into()))?;
    if fields.len() != 3 {
        return Err(Error::SchemaMismatch("signature block arity".into()));
    }
    let signer_public_key = fields[0]
        .as_bit_string()
        .ok_or_else(|| Error::SchemaMismatch("signer key is not a bit string".into()))?;
    let algorithm = fields[1]
        .as_oid()
        .ok_or_else(|| Error::SchemaMismatch("signature algorithm is not an oid".into()))?;
    let signature = fields[2]
        .as_octet_string()
        .ok_or_else(|| Error::SchemaMismatch("signature is not an octet string".into()))?;
    Ok(SignatureBlock {
        signer_public_key: signer_public_key.to_vec(),
        algorithm: algorithm.clone(),
        signature: signature.to_vec(),
    })
}

fn signature_block_value(block: &SignatureBlock) -> Value {
    Value::Sequence(vec![
        Value::BitString(block.signer_public_key.clone()),
        Value::Oid(block.algorithm.clone()),
        Value::OctetString(block.signature.clone()),
    ])
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Internal(format!("compress: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::Internal(format!("compress: {e}")))
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut decoder = ZlibDecoder::new(data).take(MAX_PLAINTEXT_LEN + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|_| Error::MalformedContainer("invalid compressed data".into()))?;
    if out.len() as u64 > MAX_PLAINTEXT_LEN {
        return Err(Error::MalformedContainer("plaintext too large".into()));
    }
    Ok(out)
}
