#[cfg(test)]
mod tests {
    use crate::blockchain::polling::BackfillTarget;
    use crate::models::Network;
    use crate::validation::*;

    #[test]
    fn test_validate_network() {
        assert_eq!(validate_network("mainnet").unwrap(), Network::Mainnet);
        assert_eq!(validate_network(" Testnet ").unwrap(), Network::Testnet);
        assert!(matches!(validate_network(""), Err(ValidationError::MissingParameter(_))));
        assert!(matches!(validate_network("devnet"), Err(ValidationError::InvalidNetwork(_))));
    }

    #[test]
    fn test_validate_height() {
        assert_eq!(validate_height("from", "42").unwrap(), 42);
        assert!(matches!(validate_height("from", "0"), Err(ValidationError::InvalidHeight { .. })));
        assert!(matches!(validate_height("from", "-3"), Err(ValidationError::InvalidHeight { .. })));
        assert!(matches!(validate_height("from", "abc"), Err(ValidationError::InvalidHeight { .. })));
        assert!(matches!(validate_height("from", " "), Err(ValidationError::MissingParameter(_))));
    }

    #[test]
    fn test_validate_backfill_range() {
        assert_eq!(
            validate_backfill_range("10", Some("20")).unwrap(),
            (10, BackfillTarget::Height(20))
        );
        assert_eq!(validate_backfill_range("10", None).unwrap(), (10, BackfillTarget::Latest));
        assert_eq!(validate_backfill_range("10", Some("")).unwrap(), (10, BackfillTarget::Latest));
        assert_eq!(
            validate_backfill_range("5", Some("5")).unwrap(),
            (5, BackfillTarget::Height(5))
        );
        assert!(matches!(
            validate_backfill_range("20", Some("10")),
            Err(ValidationError::InvalidRange { from: 20, to: 10 })
        ));
        assert!(matches!(
            validate_backfill_range("1", Some("100001")),
            Err(ValidationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validate_tx_hash() {
        let lower = "ab".repeat(32);
        assert_eq!(validate_tx_hash(&lower).unwrap(), "AB".repeat(32));
        assert_eq!(validate_tx_hash(&format!("0x{}", lower)).unwrap(), "AB".repeat(32));
        assert!(validate_tx_hash("abc").is_err());
        assert!(validate_tx_hash(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_parse_envelope_input() {
        assert_eq!(parse_envelope_input("0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(parse_envelope_input("0x0A0B").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(parse_envelope_input("CgsM").unwrap(), vec![0x0a, 0x0b, 0x0c]);
        assert!(matches!(parse_envelope_input(""), Err(ValidationError::MissingParameter(_))));
        assert!(matches!(parse_envelope_input("0xzz"), Err(ValidationError::InvalidParameter(_))));
        assert!(matches!(parse_envelope_input("!!!"), Err(ValidationError::InvalidParameter(_))));
    }
}
