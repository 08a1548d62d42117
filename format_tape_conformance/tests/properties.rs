// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests: packing then unpacking with the same template returns the input.

#![allow(missing_docs, reason = "integration test crate")]

use format_tape::builder::BuildConfig;
use format_tape::host::ValueHost;
use format_tape::trace::TraceMask;
use format_tape::value::{ByteString, Value};
use format_tape::vm::{Limits, Packer, Unpacker, compile_pack, compile_unpack};
use format_tape::{pack, unpack};
use num_bigint::BigInt;
use proptest::prelude::*;

/// Integer directives with the inclusive range they round-trip.
const INTEGER_DIRECTIVES: &[(&str, i64, i64)] = &[
    ("c", i8::MIN as i64, i8::MAX as i64),
    ("C", 0, u8::MAX as i64),
    ("s<", i16::MIN as i64, i16::MAX as i64),
    ("s>", i16::MIN as i64, i16::MAX as i64),
    ("n", 0, u16::MAX as i64),
    ("v", 0, u16::MAX as i64),
    ("l<", i32::MIN as i64, i32::MAX as i64),
    ("l>", i32::MIN as i64, i32::MAX as i64),
    ("N", 0, u32::MAX as i64),
    ("V", 0, u32::MAX as i64),
    ("q<", i64::MIN, i64::MAX),
    ("q>", i64::MIN, i64::MAX),
];

fn integer_case() -> impl Strategy<Value = (&'static str, i64)> {
    (0..INTEGER_DIRECTIVES.len()).prop_flat_map(|i| {
        let (directive, lo, hi) = INTEGER_DIRECTIVES[i];
        let edges = prop_oneof![Just(lo), Just(hi), Just(0), Just(lo / 2), Just(hi / 2)];
        (Just(directive), prop_oneof![edges, lo..=hi])
    })
}

/// `directive` with an explicit count of 2 to 5, and that many values it round-trips exactly.
fn counted<S>(directive: &'static str, value: S) -> BoxedStrategy<(String, Vec<Value>)>
where
    S: Strategy<Value = Value> + 'static,
{
    proptest::collection::vec(value, 2..6)
        .prop_map(move |values| (format!("{directive}{}", values.len()), values))
        .boxed()
}

fn fixed_count_case() -> impl Strategy<Value = (String, Vec<Value>)> {
    let mut cases: Vec<_> = INTEGER_DIRECTIVES
        .iter()
        .map(|&(directive, lo, hi)| counted(directive, (lo..=hi).prop_map(Value::Int)))
        .collect();
    for directive in ["e", "g", "F"] {
        let single = any::<f32>()
            .prop_filter("NaN never compares equal", |v| !v.is_nan())
            .prop_map(|v| Value::Float(f64::from(v)));
        cases.push(counted(directive, single));
    }
    for directive in ["E", "G", "D"] {
        let double = any::<f64>()
            .prop_filter("NaN never compares equal", |v| !v.is_nan())
            .prop_map(Value::Float);
        cases.push(counted(directive, double));
    }
    cases.push(counted(
        "U",
        any::<char>().prop_map(|c| Value::Int(i64::from(u32::from(c)))),
    ));
    cases.push(counted("w", any::<u64>().prop_map(Value::from)));
    proptest::strategy::Union::new(cases)
}

proptest! {
    #[test]
    fn fixed_counts_round_trip((format, values) in fixed_count_case()) {
        let out = pack(&format, &values).unwrap();
        prop_assert_eq!(unpack(&format, &out.bytes).unwrap(), values, "{}", format);
    }

    #[test]
    fn integers_round_trip((directive, value) in integer_case()) {
        let out = pack(directive, &[Value::Int(value)]).unwrap();
        let back = unpack(directive, &out.bytes).unwrap();
        prop_assert_eq!(back, vec![Value::Int(value)]);
    }

    #[test]
    fn little_and_big_endian_mirror_each_other(value in any::<u32>()) {
        let value = i64::from(value);
        let little = pack("V", &[Value::Int(value)]).unwrap().bytes;
        let mut big = pack("N", &[Value::Int(value)]).unwrap().bytes;
        big.reverse();
        prop_assert_eq!(little, big);
    }

    #[test]
    fn unsigned_64_bit_values_round_trip(value in any::<u64>()) {
        let v = Value::from(value);
        let out = pack("Q>", std::slice::from_ref(&v)).unwrap();
        prop_assert_eq!(&out.bytes[..], &value.to_be_bytes()[..]);
        prop_assert_eq!(unpack("Q>", &out.bytes).unwrap(), vec![v]);
    }

    #[test]
    fn doubles_round_trip(value in any::<f64>().prop_filter("NaN never compares equal", |v| !v.is_nan())) {
        for directive in ["D", "E", "G"] {
            let out = pack(directive, &[Value::Float(value)]).unwrap();
            prop_assert_eq!(unpack(directive, &out.bytes).unwrap(), vec![Value::Float(value)]);
        }
    }

    #[test]
    fn ber_round_trips_bignums(bytes in proptest::collection::vec(any::<u8>(), 0..24)) {
        let value = Value::from(BigInt::from_bytes_be(num_bigint::Sign::Plus, &bytes));
        let out = pack("w", std::slice::from_ref(&value)).unwrap();
        prop_assert!(out.bytes.last().is_some_and(|b| b & 0x80 == 0));
        prop_assert_eq!(unpack("w", &out.bytes).unwrap(), vec![value]);
    }

    #[test]
    fn binary_strings_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let value = Value::bytes(bytes.clone());
        let out = pack("a*", std::slice::from_ref(&value)).unwrap();
        prop_assert_eq!(&out.bytes, &bytes);
        prop_assert_eq!(unpack("a*", &out.bytes).unwrap(), vec![value]);
    }

    #[test]
    fn encoded_strings_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
        let expected = vec![Value::Str(ByteString::binary(bytes.clone()))];
        for directive in ["m", "m0", "u", "M"] {
            let out = pack(directive, &[Value::bytes(bytes.clone())]).unwrap();
            prop_assert_eq!(&unpack(directive, &out.bytes).unwrap(), &expected, "{}", directive);
        }
    }

    #[test]
    fn hex_strings_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
        let out = pack("H*", &[Value::bytes(hex(&bytes))]).unwrap();
        prop_assert_eq!(&out.bytes, &bytes);
        prop_assert_eq!(
            unpack("H*", &out.bytes).unwrap(),
            vec![Value::Str(ByteString::ascii(hex(&bytes)))]
        );
    }

    #[test]
    fn code_points_round_trip(c in any::<char>()) {
        let value = Value::Int(i64::from(u32::from(c)));
        let out = pack("U", std::slice::from_ref(&value)).unwrap();
        let expected = c.to_string();
        prop_assert_eq!(&out.bytes[..], expected.as_bytes());
        prop_assert_eq!(unpack("U", &out.bytes).unwrap(), vec![value]);
    }

    #[test]
    fn star_packs_every_value(values in proptest::collection::vec(any::<u16>(), 0..40)) {
        let values: Vec<Value> = values.into_iter().map(|v| Value::Int(i64::from(v))).collect();
        let out = pack("n*", &values).unwrap();
        prop_assert_eq!(out.length, values.len() * 2);
        prop_assert_eq!(unpack("n*", &out.bytes).unwrap(), values);
    }

    #[test]
    fn groups_match_their_expansion(count in 0_usize..12, threshold in 0_usize..8) {
        let config = BuildConfig { unroll_threshold: threshold };
        let values: Vec<Value> = (0..count as i64 * 2).map(Value::Int).collect();
        let grouped = compile_pack(format!("(C n){count}").as_bytes(), &config).unwrap();
        let flat = compile_pack("C n ".repeat(count).as_bytes(), &config).unwrap();

        let mut packer = Packer::new(ValueHost::new(), Limits::default());
        let a = packer.run(&grouped, &values, TraceMask::NONE, None).unwrap();
        let b = packer.run(&flat, &values, TraceMask::NONE, None).unwrap();
        prop_assert_eq!(&a.bytes, &b.bytes);

        let unpack_grouped = compile_unpack(format!("(C n){count}").as_bytes(), &config).unwrap();
        let mut unpacker = Unpacker::new(ValueHost::new(), Limits::default());
        let back = unpacker.run(&unpack_grouped, &a.bytes, TraceMask::NONE, None).unwrap();
        prop_assert_eq!(back.values, values);
    }
}

fn hex(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|b| format!("{b:02x}").into_bytes())
        .collect()
}
