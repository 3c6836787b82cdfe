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

//! Strict DER codec for the container wire format.
//!
//! Only the shapes the container needs are supported: SEQUENCE, INTEGER,
//! BOOLEAN, OCTET STRING, BIT STRING, OBJECT IDENTIFIER, and explicit
//! context tags. Encoding is canonical: the same value always produces the
//! same bytes. Decoding is DER-strict and rejects BER length variants,
//! non-minimal integers, unused bit-string bits, and trailing bytes.

use thiserror::Error;

/// DER codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Asn1Error {
    /// Input ended inside a TLV.
    #[error("truncated")]
    Truncated,
    /// Bytes remained after the outermost element.
    #[error("trailing bytes")]
    TrailingBytes,
    /// Length octets are not valid DER.
    #[error("invalid length encoding")]
    InvalidLength,
    /// Tag is not part of the supported subset.
    #[error("unsupported tag {0:#04x}")]
    UnsupportedTag(u8),
    /// Content octets violate DER for the tag.
    #[error("invalid content octets")]
    InvalidContent,
    /// Integer does not fit the codec's integer width.
    #[error("integer out of range")]
    IntegerOverflow,
}

const TAG_BOOLEAN: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_CONSTRUCTED: u8 = 0xa0;

/// Object identifier as a sequence of arcs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Oid(Vec<u64>);

/// `aes-256-cbc` (NIST AES OID arc).
pub const AES_256_CBC_ARCS: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];
/// `aes-256-gcm` (NIST AES OID arc).
pub const AES_256_GCM_ARCS: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 46];
/// `sha3-256` (NIST hash algorithms arc), used for sensitive-attribute salts.
pub const SHA3_256_ARCS: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 8];
/// `id-Ed25519` signature algorithm.
pub const ED25519_ARCS: &[u64] = &[1, 3, 101, 112];

impl Oid {
    /// Build from raw arcs. At least two arcs, first arc <= 2.
    pub fn from_arcs(arcs: &[u64]) -> Option<Self> {
        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
            return None;
        }
        Some(Self(arcs.to_vec()))
    }

    /// The arcs of this identifier.
    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    /// Dotted-decimal form, e.g. `2.16.840.1.101.3.4.1.42`.
    pub fn dotted(&self) -> String {
        self.0
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// One DER value from the supported subset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// BOOLEAN.
    Boolean(bool),
    /// INTEGER (bounded to i64 by this codec).
    Integer(i64),
    /// OCTET STRING.
    OctetString(Vec<u8>),
    /// BIT STRING with zero unused bits.
    BitString(Vec<u8>),
    /// OBJECT IDENTIFIER.
    Oid(Oid),
    /// SEQUENCE of values.
    Sequence(Vec<Value>),
    /// Explicitly tagged value, context class, tag number < 31.
    Tagged(u8, Box<Value>),
}

impl Value {
    /// Integer content, if this is an INTEGER.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Octet-string content, if this is an OCTET STRING.
    pub fn as_octet_string(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) => Some(b),
            _ => None,
        }
    }

    /// Bit-string content, if this is a BIT STRING.
    pub fn as_bit_string(&self) -> Option<&[u8]> {
        match self {
            Value::BitString(b) => Some(b),
            _ => None,
        }
    }

    /// Element list, if this is a SEQUENCE.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Tag number and inner value, if this is an explicit context tag.
    pub fn as_tagged(&self) -> Option<(u8, &Value)> {
        match self {
            Value::Tagged(n, inner) => Some((*n, inner)),
            _ => None,
        }
    }

    /// Identifier arcs, if this is an OBJECT IDENTIFIER.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::Oid(oid) => Some(oid),
            _ => None,
        }
    }
}

/// Encode a value as canonical DER.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Boolean(b) => {
            write_tlv(out, TAG_BOOLEAN, &[if *b { 0xff } else { 0x00 }]);
        }
        Value::Integer(v) => {
            let content = integer_content(*v);
            write_tlv(out, TAG_INTEGER, &content);
        }
        Value::OctetString(b) => {
            write_tlv(out, TAG_OCTET_STRING, b);
        }
        Value::BitString(b) => {
            let mut content = Vec::with_capacity(b.len() + 1);
            content.push(0x00);
            content.extend_from_slice(b);
            write_tlv(out, TAG_BIT_STRING, &content);
        }
        Value::Oid(oid) => {
            write_tlv(out, TAG_OID, &oid_content(oid));
        }
        Value::Sequence(items) => {
            let mut content = Vec::new();
            for item in items {
                encode_into(item, &mut content);
            }
            write_tlv(out, TAG_SEQUENCE, &content);
        }
        Value::Tagged(n, inner) => {
            let mut content = Vec::new();
            encode_into(inner, &mut content);
            write_tlv(out, TAG_CONTEXT_CONSTRUCTED | (n & 0x1f), &content);
        }
    }
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let tail = &bytes[skip..];
    out.push(0x80 | tail.len() as u8);
    out.extend_from_slice(tail);
}

fn integer_content(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let cur = bytes[start];
        let next = bytes[start + 1];
        // Drop redundant sign-extension octets only.
        if (cur == 0x00 && next & 0x80 == 0) || (cur == 0xff && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

fn oid_content(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    let mut out = Vec::new();
    push_base128(&mut out, arcs[0] * 40 + arcs[1]);
    for &arc in &arcs[2..] {
        push_base128(&mut out, arc);
    }
    out
}

fn push_base128(out: &mut Vec<u8>, mut v: u64) {
    let mut stack = [0u8; 10];
    let mut n = 0;
    loop {
        stack[n] = (v & 0x7f) as u8;
        v >>= 7;
        n += 1;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let mut b = stack[i];
        if i != 0 {
            b |= 0x80;
        }
        out.push(b);
    }
}

// Nesting bound for hostile inputs.
const MAX_DEPTH: u32 = 32;

/// Decode exactly one DER value; trailing bytes are rejected.
pub fn decode(bytes: &[u8]) -> Result<Value, Asn1Error> {
    let mut cursor = Cursor { buf: bytes, pos: 0 };
    let value = decode_value(&mut cursor, 0)?;
    if cursor.pos != bytes.len() {
        return Err(Asn1Error::TrailingBytes);
    }
    Ok(value)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Asn1Error> {
        let end = self.pos.checked_add(n).ok_or(Asn1Error::Truncated)?;
        if end > self.buf.len() {
            return Err(Asn1Error::Truncated);
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn take_u8(&mut self) -> Result<u8, Asn1Error> {
        Ok(self.take(1)?[0])
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn read_length(cursor: &mut Cursor<'_>) -> Result<usize, Asn1Error> {
    let first = cursor.take_u8()?;
    if first < 0x80 {
        return Ok(first as usize);
    }
    if first == 0x80 {
        // Indefinite length is BER, not DER.
        return Err(Asn1Error::InvalidLength);
    }
    let count = (first & 0x7f) as usize;
    if count > 8 {
        return Err(Asn1Error::InvalidLength);
    }
    let octets = cursor.take(count)?;
    if octets[0] == 0x00 {
        return Err(Asn1Error::InvalidLength);
    }
    let mut len: u64 = 0;
    for &b in octets {
        len = (len << 8) | b as u64;
    }
    // Long form must be necessary.
    if len < 0x80 {
        return Err(Asn1Error::InvalidLength);
    }
    usize::try_from(len).map_err(|_| Asn1Error::InvalidLength)
}

fn decode_value(cursor: &mut Cursor<'_>, depth: u32) -> Result<Value, Asn1Error> {
    if depth > MAX_DEPTH {
        return Err(Asn1Error::InvalidContent);
    }
    let tag = cursor.take_u8()?;
    if tag & 0x1f == 0x1f {
        return Err(Asn1Error::UnsupportedTag(tag));
    }
    let len = read_length(cursor)?;
    let content = cursor.take(len)?;

    match tag {
        TAG_BOOLEAN => {
            if content.len() != 1 {
                return Err(Asn1Error::InvalidContent);
            }
            match content[0] {
                0x00 => Ok(Value::Boolean(false)),
                0xff => Ok(Value::Boolean(true)),
                _ => Err(Asn1Error::InvalidContent),
            }
        }
        TAG_INTEGER => Ok(Value::Integer(parse_integer(content)?)),
        TAG_OCTET_STRING => Ok(Value::OctetString(content.to_vec())),
        TAG_BIT_STRING => {
            // The container never produces partial octets.
            let (&unused, rest) = content.split_first().ok_or(Asn1Error::InvalidContent)?;
            if unused != 0 {
                return Err(Asn1Error::InvalidContent);
            }
            Ok(Value::BitString(rest.to_vec()))
        }
        TAG_OID => Ok(Value::Oid(parse_oid(content)?)),
        TAG_SEQUENCE => {
            let mut inner = Cursor { buf: content, pos: 0 };
            let mut items = Vec::new();
            while inner.remaining() > 0 {
                items.push(decode_value(&mut inner, depth + 1)?);
            }
            Ok(Value::Sequence(items))
        }
        t if t & 0xe0 == TAG_CONTEXT_CONSTRUCTED => {
            let mut inner = Cursor { buf: content, pos: 0 };
            let value = decode_value(&mut inner, depth + 1)?;
            if inner.remaining() != 0 {
                return Err(Asn1Error::TrailingBytes);
            }
            Ok(Value::Tagged(t & 0x1f, Box::new(value)))
        }
        other => Err(Asn1Error::UnsupportedTag(other)),
    }
}

fn parse_integer(content: &[u8]) -> Result<i64, Asn1Error> {
    if content.is_empty() {
        return Err(Asn1Error::InvalidContent);
    }
    if content.len() > 1 {
        let redundant = (content[0] == 0x00 && content[1] & 0x80 == 0)
            || (content[0] == 0xff && content[1] & 0x80 != 0);
        if redundant {
            return Err(Asn1Error::InvalidContent);
        }
    }
    if content.len() > 8 {
        return Err(Asn1Error::IntegerOverflow);
    }
    let mut acc: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in content {
        acc = (acc << 8) | b as i64;
    }
    Ok(acc)
}

fn parse_oid(content: &[u8]) -> Result<Oid, Asn1Error> {
    if content.is_empty() {
        return Err(Asn1Error::InvalidContent);
    }
    let mut arcs = Vec::new();
    let mut acc: u64 = 0;
    let mut in_arc = false;
    for (i, &b) in content.iter().enumerate() {
        if !in_arc && b == 0x80 {
            // Non-minimal base-128 arc.
            return Err(Asn1Error::InvalidContent);
        }
        in_arc = true;
        if acc > u64::MAX >> 7 {
            return Err(Asn1Error::IntegerOverflow);
        }
        acc = (acc << 7) | (b & 0x7f) as u64;
        if b & 0x80 == 0 {
            if arcs.is_empty() {
                let first = if acc < 40 {
                    (0, acc)
                } else if acc < 80 {
                    (1, acc - 40)
                } else {
                    (2, acc - 80)
                };
                arcs.push(first.0);
                arcs.push(first.1);
            } else {
                arcs.push(acc);
            }
            acc = 0;
            in_arc = false;
        } else if i == content.len() - 1 {
            return Err(Asn1Error::Truncated);
        }
    }
    Ok(Oid(arcs))
}
