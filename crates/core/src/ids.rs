//! `base36(nowMs) + "-" + random6` usage-event ids (spec §4.4).

use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: i64) -> String {
    if n <= 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        let digit = (n % 36) as usize;
        buf.push(ALPHABET[digit]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap()
}

/// `now_ms` is threaded in by the caller (`chrono::Utc::now()`) so this
/// stays a pure, testable function.
pub fn generate_usage_event_id(now_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("{}-{}", to_base36(now_ms), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_base36_prefix_and_six_char_suffix() {
        let id = generate_usage_event_id(1_700_000_000_000);
        let (prefix, suffix) = id.split_once('-').unwrap();
        assert!(!prefix.is_empty());
        assert_eq!(suffix.len(), 6);
    }

    #[test]
    fn zero_timestamp_encodes_to_single_zero_digit() {
        assert_eq!(to_base36(0), "0");
    }
}
