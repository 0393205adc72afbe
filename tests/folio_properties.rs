use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use youth_card_registry::domain::folio::{
    format_legacy_folio_display, generate_digital_folio_at, next_legacy_folio,
    validate_legacy_folio, LEGACY_PREFIX,
};
use youth_card_registry::{LegacyFolioRejection, RegistrationError};

/// Standard Luhn acceptance over a full number, check digit included
fn luhn_accepts(number: &str) -> bool {
    let sum: u32 = number
        .chars()
        .filter_map(|c| c.to_digit(10))
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[test]
fn digital_folios_pass_luhn_and_stay_unique_within_a_month() {
    let issued_at = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
    let mut seen = HashSet::new();

    for id in 1..=5000 {
        let folio = generate_digital_folio_at(id, issued_at);
        let parts: Vec<&str> = folio.split('-').collect();

        assert_eq!(parts.len(), 5, "{}", folio);
        assert_eq!(parts[0], "BJ");
        assert_eq!(parts[1], "2026");
        assert_eq!(parts[2], "03");
        assert_eq!(parts[3].len(), 6);
        assert_eq!(parts[4].len(), 1);
        assert!(luhn_accepts(&folio), "{} fails Luhn", folio);
        assert!(seen.insert(folio));
    }
}

#[test]
fn legacy_sequence_walks_the_full_tail_range() {
    let mut current: Option<String> = None;

    for expected_tail in 1..=9999u32 {
        let next = next_legacy_folio(current.as_deref()).unwrap();
        assert_eq!(next, format!("{}{:04}", LEGACY_PREFIX, expected_tail));
        assert_eq!(validate_legacy_folio(&next), Ok(next.clone()));
        current = Some(next);
    }

    assert!(matches!(
        next_legacy_folio(current.as_deref()),
        Err(RegistrationError::SequenceExhausted { .. })
    ));
}

#[test]
fn validation_reports_the_first_failing_rule() {
    assert_eq!(validate_legacy_folio("12345"), Err(LegacyFolioRejection::WrongLength));
    assert_eq!(
        validate_legacy_folio("12345678901200a1"),
        Err(LegacyFolioRejection::NonDigit)
    );
    assert_eq!(
        validate_legacy_folio("9234567890120001"),
        Err(LegacyFolioRejection::WrongPrefix)
    );
    assert_eq!(
        validate_legacy_folio("1234567890120000"),
        Err(LegacyFolioRejection::TailOutOfRange)
    );
    assert_eq!(
        format_legacy_folio_display(&validate_legacy_folio("1234-5678-9012-0300").unwrap()),
        "1234-5678-9012-0300"
    );
}
