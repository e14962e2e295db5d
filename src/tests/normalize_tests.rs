#[cfg(test)]
mod tests {
    use crate::decoder::normalize::{join_halves, normalize_json, wide, wide_signed};
    use serde_json::json;

    #[test]
    fn test_wide_values() {
        assert_eq!(wide(0), json!(0));
        assert_eq!(wide(u32::MAX as u64), json!(4294967295u64));
        assert_eq!(wide(u32::MAX as u64 + 1), json!("4294967296"));
        assert_eq!(wide(u64::MAX), json!("18446744073709551615"));
        assert_eq!(wide_signed(12), json!(12));
        assert_eq!(wide_signed(1 << 40), json!("1099511627776"));
    }

    #[test]
    fn test_join_halves() {
        assert_eq!(join_halves(0, 7, false), json!(7));
        assert_eq!(join_halves(1, 0, true), json!("4294967296"));
        assert_eq!(join_halves(2, 5, false), json!("8589934597"));
        // low half arrives as a signed 32-bit value
        assert_eq!(join_halves(0, -1, true), json!(4294967295u64));
    }

    #[test]
    fn test_normalize_nested_objects() {
        let value = json!({
            "a": { "high": 0, "low": 10 },
            "b": [{ "high": 1, "low": 1, "unsigned": true }],
            "c": { "high": 0, "low": 3, "other": "kept" },
            "d": "text",
        });

        assert_eq!(
            normalize_json(value),
            json!({
                "a": 10,
                "b": ["4294967297"],
                "c": { "high": 0, "low": 3, "other": "kept" },
                "d": "text",
            })
        );
    }
}
