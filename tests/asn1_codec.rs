// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use anchorstore::core::asn1::{
    decode, encode, Asn1Error, Oid, Value, AES_256_CBC_ARCS, AES_256_GCM_ARCS, ED25519_ARCS,
    SHA3_256_ARCS,
};

#[test]
fn nested_structure_roundtrip() {
    let value = Value::Sequence(vec![
        Value::Integer(1),
        Value::Tagged(
            0,
            Box::new(Value::Sequence(vec![
                Value::Sequence(vec![Value::Sequence(vec![
                    Value::BitString(vec![0xaa; 64]),
                    Value::BitString(vec![0xbb; 92]),
                ])]),
                Value::OctetString(vec![0x11; 16]),
                Value::OctetString(vec![0x22; 300]),
            ])),
        ),
        Value::Sequence(vec![
            Value::BitString(vec![0xcc; 64]),
            Value::Oid(Oid::from_arcs(ED25519_ARCS).expect("oid")),
            Value::OctetString(vec![0xdd; 64]),
        ]),
    ]);
    let encoded = encode(&value);
    assert_eq!(decode(&encoded).expect("decode"), value);
}

#[test]
fn integer_edge_values_roundtrip() {
    for v in [0i64, 1, 127, 128, 255, 256, -1, -128, -129, i64::MAX, i64::MIN] {
        let encoded = encode(&Value::Integer(v));
        assert_eq!(decode(&encoded).expect("decode"), Value::Integer(v), "value {v}");
    }
}

#[test]
fn known_oid_encodings() {
    let cases: [(&[u64], &str); 4] = [
        (AES_256_CBC_ARCS, "060960864801650304012a"),
        (AES_256_GCM_ARCS, "060960864801650304012e"),
        (SHA3_256_ARCS, "0609608648016503040208"),
        (ED25519_ARCS, "06032b6570"),
    ];
    for (arcs, expected) in cases {
        let oid = Oid::from_arcs(arcs).expect("oid");
        assert_eq!(hex::encode(encode(&Value::Oid(oid.clone()))), expected);
        assert_eq!(
            decode(&hex::decode(expected).expect("hex")).expect("decode"),
            Value::Oid(oid)
        );
    }
}

#[test]
fn oid_dotted_form() {
    let oid = Oid::from_arcs(AES_256_GCM_ARCS).expect("oid");
    assert_eq!(oid.dotted(), "2.16.840.1.101.3.4.1.46");
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut encoded = encode(&Value::Integer(5));
    encoded.push(0x00);
    assert_eq!(decode(&encoded), Err(Asn1Error::TrailingBytes));
}

#[test]
fn truncated_input_is_rejected() {
    let encoded = encode(&Value::OctetString(vec![1, 2, 3, 4]));
    assert_eq!(decode(&encoded[..encoded.len() - 1]), Err(Asn1Error::Truncated));
}

#[test]
fn ber_length_variants_are_rejected() {
    // Long-form length for a value that fits the short form.
    assert_eq!(
        decode(&[0x04, 0x81, 0x01, 0xff]),
        Err(Asn1Error::InvalidLength)
    );
    // Indefinite length.
    assert_eq!(decode(&[0x30, 0x80, 0x00, 0x00]), Err(Asn1Error::InvalidLength));
    // Leading zero in long-form length octets.
    assert_eq!(
        decode(&[0x04, 0x82, 0x00, 0x81]),
        Err(Asn1Error::InvalidLength)
    );
}

#[test]
fn non_minimal_integers_are_rejected() {
    assert_eq!(decode(&[0x02, 0x02, 0x00, 0x01]), Err(Asn1Error::InvalidContent));
    assert_eq!(decode(&[0x02, 0x02, 0xff, 0x80]), Err(Asn1Error::InvalidContent));
    assert_eq!(decode(&[0x02, 0x00]), Err(Asn1Error::InvalidContent));
}

#[test]
fn loose_booleans_are_rejected() {
    assert_eq!(decode(&[0x01, 0x01, 0x01]), Err(Asn1Error::InvalidContent));
    assert_eq!(decode(&[0x01, 0x01, 0x00]).expect("decode"), Value::Boolean(false));
    assert_eq!(decode(&[0x01, 0x01, 0xff]).expect("decode"), Value::Boolean(true));
}

#[test]
fn partial_bit_strings_are_rejected() {
    // Unused-bit count must be zero for this format.
    assert_eq!(decode(&[0x03, 0x02, 0x04, 0xf0]), Err(Asn1Error::InvalidContent));
    assert_eq!(
        decode(&[0x03, 0x02, 0x00, 0xf0]).expect("decode"),
        Value::BitString(vec![0xf0])
    );
}

#[test]
fn unsupported_tags_are_rejected() {
    // PrintableString is outside the supported subset.
    assert_eq!(
        decode(&[0x13, 0x01, 0x41]),
        Err(Asn1Error::UnsupportedTag(0x13))
    );
}

#[test]
fn long_content_uses_minimal_long_form() {
    let value = Value::OctetString(vec![0xab; 200]);
    let encoded = encode(&value);
    assert_eq!(&encoded[..3], &[0x04, 0x81, 0xc8]);
    assert_eq!(decode(&encoded).expect("decode"), value);
}
