//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::net;
use spine_prefix_manager::error::KeyParseError;
use spine_prefix_manager::key::{KeyFormat, PrefixKey};

#[test]
fn encode_legacy() {
    let key = PrefixKey::new("node-1", "area-a", net!("10.0.0.0/8"));
    assert_eq!(
        key.encode(KeyFormat::Legacy),
        "prefix:node-1:area-a:[10.0.0.0/8]"
    );

    let key = PrefixKey::new("node-1", "area-a", net!("2001:db8::/32"));
    assert_eq!(
        key.encode(KeyFormat::Legacy),
        "prefix:node-1:area-a:[2001:db8::/32]"
    );
}

#[test]
fn encode_v2() {
    // 0x02 format version, 0x04 family, 0x08 prefix length, then the
    // address left-aligned in 16 octets.
    let key = PrefixKey::new("node-1", "area-a", net!("10.0.0.0/8"));
    assert_eq!(
        key.encode(KeyFormat::V2),
        "prefixV2:node-1:area-a:\
         0204080a000000000000000000000000000000"
    );

    let key = PrefixKey::new("node-1", "area-a", net!("2001:db8::/32"));
    assert_eq!(
        key.encode(KeyFormat::V2),
        "prefixV2:node-1:area-a:\
         02062020010db8000000000000000000000000"
    );
}

#[test]
fn parse_roundtrip() {
    for prefix in [
        net!("0.0.0.0/0"),
        net!("10.1.1.1/32"),
        net!("192.168.0.0/16"),
        net!("::/0"),
        net!("2001:db8:1000::/48"),
        net!("2001:db8::1/128"),
    ] {
        let key = PrefixKey::new("node-1", "area-a", prefix);
        for format in [KeyFormat::Legacy, KeyFormat::V2] {
            let encoded = key.encode(format);
            let (parsed, detected) = PrefixKey::parse(&encoded).unwrap();
            assert_eq!(parsed, key);
            assert_eq!(detected, format);
        }
    }
}

// Keys of either format must keep parsing while a fabric is mid-upgrade
// between key formats.
#[test]
fn format_coexistence() {
    let legacy = "prefix:node-1:area-a:[10.0.0.0/8]";
    let v2 = "prefixV2:node-1:area-a:\
              0204080a000000000000000000000000000000";

    let (from_legacy, _) = PrefixKey::parse(legacy).unwrap();
    let (from_v2, _) = PrefixKey::parse(v2).unwrap();
    assert_eq!(from_legacy, from_v2);
}

#[test]
fn parse_errors() {
    // Unknown marker.
    assert_eq!(
        PrefixKey::parse("adj:node-1:area-a:x").unwrap_err(),
        KeyParseError::UnknownMarker,
    );

    // Missing fields.
    assert_eq!(
        PrefixKey::parse("prefix:node-1").unwrap_err(),
        KeyParseError::MissingField,
    );
    assert_eq!(
        PrefixKey::parse("prefix::area-a:[10.0.0.0/8]").unwrap_err(),
        KeyParseError::MissingField,
    );

    // Legacy payload without brackets.
    assert_eq!(
        PrefixKey::parse("prefix:node-1:area-a:10.0.0.0/8").unwrap_err(),
        KeyParseError::BadEncoding,
    );

    // Truncated v2 payload.
    assert_eq!(
        PrefixKey::parse("prefixV2:node-1:area-a:0204").unwrap_err(),
        KeyParseError::BadEncoding,
    );

    // Wrong format version byte.
    assert_eq!(
        PrefixKey::parse(
            "prefixV2:node-1:area-a:\
             0304080a000000000000000000000000000000"
        )
        .unwrap_err(),
        KeyParseError::BadFormatVersion(3),
    );

    // Invalid address family byte.
    assert_eq!(
        PrefixKey::parse(
            "prefixV2:node-1:area-a:\
             0205080a000000000000000000000000000000"
        )
        .unwrap_err(),
        KeyParseError::BadAddressFamily(5),
    );

    // Prefix length beyond the family maximum.
    assert_eq!(
        PrefixKey::parse(
            "prefixV2:node-1:area-a:\
             0204210a000000000000000000000000000000"
        )
        .unwrap_err(),
        KeyParseError::BadPrefixLength(33),
    );

    // Non-hex payload.
    assert_eq!(
        PrefixKey::parse(
            "prefixV2:node-1:area-a:\
             02040gza000000000000000000000000000000"
        )
        .unwrap_err(),
        KeyParseError::BadEncoding,
    );
}
