/// Characters sampled from each end of the payload.
const SAMPLE_CHARS: usize = 1000;

/// Cheap content digest for cache keying only. Not for integrity checks.
///
/// Samples the first and last 1000 characters of `payload + mode`, folds them
/// with a wrapping 31-multiplier 32-bit hash, and appends the full length so
/// payloads sharing both ends still separate when their sizes differ.
pub fn fingerprint(payload: &str, mode: &str) -> String {
    let mut keyed = String::with_capacity(payload.len() + mode.len());
    keyed.push_str(payload);
    keyed.push_str(mode);

    let units: Vec<u16> = keyed.encode_utf16().collect();
    let len = units.len();
    let head = &units[..len.min(SAMPLE_CHARS)];
    let tail = &units[len.saturating_sub(SAMPLE_CHARS)..];

    let hash = head
        .iter()
        .chain(tail)
        .fold(0i32, |h, &c| h.wrapping_mul(31).wrapping_add(i32::from(c)));

    format!("xray_{}_{len}", to_base36(i64::from(hash).unsigned_abs()))
}

/// Storage key a fingerprint is persisted under.
pub fn storage_key(fingerprint: &str) -> String {
    format!("cache_{fingerprint}")
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Upper-case base-36, used for synthetic patient tokens.
pub(crate) fn to_base36_upper(n: u64) -> String {
    to_base36(n).to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_small_inputs() {
        // "a" = 97, "b" = 98: hash("ab") sampled twice (head and tail overlap)
        // h: 0 -> 97 -> 3105 -> 96352 -> 2987010
        assert_eq!(fingerprint("a", "b"), "xray_1s0si_2");
        assert_eq!(fingerprint("", ""), "xray_0_0");
    }

    #[test]
    fn mode_changes_key() {
        let payload = "data:image/jpeg;base64,".to_string() + &"A".repeat(5000);
        assert_ne!(fingerprint(&payload, "standard"), fingerprint(&payload, "comparison"));
        assert_eq!(fingerprint(&payload, "standard"), fingerprint(&payload, "standard"));
    }

    #[test]
    fn middle_of_long_payload_is_not_sampled() {
        let a = format!("{}{}{}", "x".repeat(1500), "MIDDLE-A", "y".repeat(1500));
        let b = format!("{}{}{}", "x".repeat(1500), "MIDDLE-B", "y".repeat(1500));
        assert_eq!(fingerprint(&a, "standard"), fingerprint(&b, "standard"));
    }

    #[test]
    fn length_is_part_of_key() {
        let a = format!("{}{}", "x".repeat(1500), "y".repeat(1500));
        let b = format!("{}{}", "x".repeat(1600), "y".repeat(1500));
        let (ka, kb) = (fingerprint(&a, "m"), fingerprint(&b, "m"));
        assert!(ka.ends_with("_3001"));
        assert!(kb.ends_with("_3101"));
    }

    #[test]
    fn i32_min_hash_is_positive() {
        assert_eq!(to_base36(i64::from(i32::MIN).unsigned_abs()), "zik0zk");
    }

    #[test]
    fn base36_digits() {
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36_upper(35 * 36 + 10), "ZA");
        assert_eq!(storage_key("xray_1_2"), "cache_xray_1_2");
    }
}
