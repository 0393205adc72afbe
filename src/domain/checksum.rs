/// Luhn-style check digit over the decimal digits of `payload`.
///
/// Non-digit characters are skipped. Walking from the rightmost digit,
/// digits at even offsets (0, 2, 4, ...) are doubled and folded back below
/// ten; the check digit brings the total up to the next multiple of ten.
/// Transcription aid only, not a security control.
pub fn compute_check_digit(payload: &str) -> u8 {
    let sum: u32 = payload
        .chars()
        .filter_map(|c| c.to_digit(10))
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    ((10 - (sum % 10)) % 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // Payload "7992739871": the classic Luhn example yields 3
        assert_eq!(compute_check_digit("7992739871"), 3);
        assert_eq!(compute_check_digit("0"), 0);
        assert_eq!(compute_check_digit("5"), 9);
        assert_eq!(compute_check_digit(""), 0);
    }

    #[test]
    fn test_non_digits_are_ignored() {
        assert_eq!(
            compute_check_digit("BJ-2026-10-000042"),
            compute_check_digit("20261000042")
        );
    }

    #[test]
    fn test_digital_folio_payloads_stay_in_range() {
        for id in (1..=999_999u32).step_by(7919).chain([1, 999_999]) {
            let payload = format!("BJ202610{:06}", id);
            let first = compute_check_digit(&payload);
            assert!(first <= 9);
            assert_eq!(first, compute_check_digit(&payload));
        }
    }

    #[test]
    fn test_single_digit_error_is_detected() {
        let base = "2026100001234";
        let check = compute_check_digit(base);
        let altered = "2026100001235";
        assert_ne!(check, compute_check_digit(altered));
    }
}
