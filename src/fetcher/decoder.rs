//! Substitution-cipher decoder for encoded index payloads
//!
//! The decode key pairs its first half with its second half character for
//! character (`key[i] → key[i + n/2]`). Characters without a mapping pass
//! through unchanged. The decoded plaintext is a comma-separated decimal
//! sequence, one value per day.

use crate::pipeline::types::DataPoint;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Decode `cipher` with the substitution table described by `key`
///
/// Keys of odd length ignore their final character. The mapping is built
/// in both directions, so for keys without repeated characters decoding
/// twice restores the input.
pub fn decode(key: &str, cipher: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let half = chars.len() / 2;

    // Forward pairs win over reverse pairs when a character appears in both halves
    let mut table: HashMap<char, char> = (0..half).map(|i| (chars[i], chars[i + half])).collect();
    for i in 0..half {
        table.entry(chars[i + half]).or_insert(chars[i]);
    }

    cipher
        .chars()
        .map(|c| table.get(&c).copied().unwrap_or(c))
        .collect()
}

/// Turn decoded plaintext into daily points starting at `start`
///
/// Entry `i` is dated `start + i days`. Entries that do not parse as a
/// number (empty slots, stray characters) are skipped, but still consume
/// their day.
pub fn parse_decoded_series(plaintext: &str, start: DateTime<Utc>, source: &str) -> Vec<DataPoint> {
    plaintext
        .split(',')
        .enumerate()
        .filter_map(|(index, raw)| {
            let value: f64 = raw.trim().parse().ok()?;
            Some(DataPoint::new(start + Duration::days(index as i64), value, source))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const KEY: &str = "abcdefghij0123456789";

    #[test]
    fn test_decode_maps_first_half_to_second() {
        assert_eq!(decode(KEY, "abc"), "012");
        assert_eq!(decode(KEY, "j,a"), "9,0");
    }

    #[test]
    fn test_unmapped_characters_pass_through() {
        assert_eq!(decode(KEY, "a-Z"), "0-Z");
        assert_eq!(decode("", "anything"), "anything");
    }

    #[test]
    fn test_realistic_ptbk_payload() {
        // Shape of a real decode key: scrambled symbols paired with digits, dot and comma
        let key = "XyQ#kLmPqZs!0123456789.,";
        let key_chars: Vec<char> = key.chars().collect();
        let half = key_chars.len() / 2;
        let encode: HashMap<char, char> = (0..half).map(|i| (key_chars[i + half], key_chars[i])).collect();

        let plain = "5678,1234,90";
        let cipher: String = plain.chars().map(|c| encode.get(&c).copied().unwrap_or(c)).collect();
        assert_ne!(cipher, plain);
        assert_eq!(decode(key, &cipher), plain);
    }

    #[test]
    fn test_parse_decoded_series_skips_unparsable() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let points = parse_decoded_series("10, 20,,x,50", start, "baidu_index-popmart-all");

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10.0, 20.0, 50.0]);
        assert_eq!(points[2].timestamp, start + Duration::days(4));
        assert!(points.iter().all(|p| p.source == "baidu_index-popmart-all"));
    }

    proptest! {
        #[test]
        fn prop_decode_is_an_involution(input in proptest::collection::vec(0usize..20, 0..64)) {
            let alphabet: Vec<char> = KEY.chars().collect();
            let s: String = input.iter().map(|i| alphabet[*i]).collect();
            prop_assert_eq!(decode(KEY, &decode(KEY, &s)), s);
        }
    }
}
