//! Property tests for the pure parts of the core: cleaning, encoding and
//! response classification never panic, and cleaning undoes the vendor's
//! number formatting.

use proptest::prelude::*;
use ubersmith_core::clean::{clean_bool, clean_decimal, clean_int};
use ubersmith_core::encode::{args_from_json, encode};
use ubersmith_core::handler::{classify, Classified};
use ubersmith_core::php::unserialize;
use ubersmith_core::HttpResponse;

/// Render `n` with `,` thousands separators, the way the vendor formats totals.
fn with_separators(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

/// Nested JSON objects with lowercase keys and string leaves.
fn nested_args() -> impl Strategy<Value = serde_json::Value> {
    let leaf = "[a-z0-9 ]{0,8}".prop_map(serde_json::Value::from);
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 1..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            prop::collection::vec(inner, 1..4).prop_map(serde_json::Value::Array),
        ]
    })
}

fn leaf_count(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Object(map) => map.values().map(leaf_count).sum(),
        serde_json::Value::Array(items) => items.iter().map(leaf_count).sum(),
        _ => 1,
    }
}

proptest! {
    #[test]
    fn int_cleaning_strips_separators(n in any::<i64>()) {
        prop_assert_eq!(clean_int(&with_separators(n)).unwrap(), Some(n));
    }

    #[test]
    fn decimal_cleaning_strips_separators(n in -1_000_000_000i64..1_000_000_000, cents in 0u32..100) {
        let raw = format!("{}.{cents:02}", with_separators(n));
        let cleaned = clean_decimal(&raw).unwrap().unwrap();
        prop_assert_eq!(cleaned.to_string().replace('-', ""), raw.replace([',', '-'], ""));
    }

    #[test]
    fn int_cleaning_never_panics(raw in ".{0,24}") {
        let _ = clean_int(&raw);
        let _ = clean_bool(&raw);
    }

    #[test]
    fn encoded_keys_use_php_brackets(root in "[a-z]{1,6}", value in nested_args()) {
        let mut top = serde_json::Map::new();
        top.insert(root.clone(), value.clone());
        let args = args_from_json(serde_json::Value::Object(top)).unwrap();
        let encoded = encode(&args).unwrap();
        let key_shape = regex::Regex::new(r"^[a-z]+(\[[a-z0-9]+\])*$").unwrap();

        prop_assert_eq!(encoded.fields.len(), leaf_count(&value));
        for (key, _) in &encoded.fields {
            prop_assert!(key.starts_with(root.as_str()), "{}", key);
            prop_assert!(key_shape.is_match(key), "{}", key);
        }
    }

    #[test]
    fn php_decoding_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = unserialize(&bytes);
    }

    #[test]
    fn non_json_bodies_never_fail_classification(body in ".{0,64}") {
        let response = HttpResponse::ok("text/plain", body);
        prop_assert_eq!(classify(&response).unwrap(), Classified::NonJson);
    }
}
