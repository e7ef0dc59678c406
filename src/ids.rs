//! Human-readable identifiers for persons and benefit cards.
//!
//! Identifiers are random and date-partitioned, so they are not unique by
//! construction. Callers go through [`issue_unique`] or [`issue_and_commit`],
//! which re-check every candidate and give up after a bounded number of
//! attempts.

use chrono::{Local, NaiveDate};
use rand::Rng;
use tracing::warn;

use crate::error::{RegistryError, RegistryResult};

pub const HEALTH_ID_PREFIX: &str = "HLTH";
pub const CARD_PREFIX: &str = "ABY";

const HEALTH_ID_SUFFIX: std::ops::RangeInclusive<u32> = 10_000..=99_999;
const CARD_DIGITS: std::ops::RangeInclusive<u64> = 100_000_000_000_000..=999_999_999_999_999;

/// Source of candidate identifiers. Swappable so tests can force collisions.
pub trait IdentifierSource: Send + Sync {
    /// `HLTH-YYYYMMDD-NNNNN`
    fn person_id(&self) -> String;

    /// `ABY-` followed by 15 digits.
    fn card_number(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdentifiers;

impl IdentifierSource for RandomIdentifiers {
    fn person_id(&self) -> String {
        let suffix = rand::thread_rng().gen_range(HEALTH_ID_SUFFIX);
        format_person_id(Local::now().date_naive(), suffix)
    }

    fn card_number(&self) -> String {
        format_card_number(rand::thread_rng().gen_range(CARD_DIGITS))
    }
}

pub fn format_person_id(date: NaiveDate, suffix: u32) -> String {
    format!("{HEALTH_ID_PREFIX}-{}-{suffix:05}", date.format("%Y%m%d"))
}

pub fn format_card_number(digits: u64) -> String {
    format!("{CARD_PREFIX}-{digits:015}")
}

/// True when `value` is a well-formed health identifier with a real calendar date.
pub fn is_health_id(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == HEALTH_ID_PREFIX
        && date.len() == 8
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && suffix.len() == 5
        && suffix.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_card_number(value: &str) -> bool {
    match value.split_once('-') {
        Some((prefix, digits)) => {
            prefix == CARD_PREFIX && digits.len() == 15 && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Draws candidates until `in_use` reports a free one.
pub fn issue_unique(
    kind: &'static str,
    attempts: u32,
    generate: impl FnMut() -> String,
    in_use: impl FnMut(&str) -> RegistryResult<bool>,
) -> RegistryResult<String> {
    issue_and_commit(kind, attempts, generate, in_use, Ok)
}

/// Draws a free candidate and hands it to `commit`. A uniqueness violation
/// raised by `commit` means another writer took the same value between the
/// check and the write; that costs one attempt and the loop draws again.
pub fn issue_and_commit<T>(
    kind: &'static str,
    attempts: u32,
    mut generate: impl FnMut() -> String,
    mut in_use: impl FnMut(&str) -> RegistryResult<bool>,
    mut commit: impl FnMut(String) -> RegistryResult<T>,
) -> RegistryResult<T> {
    for attempt in 1..=attempts {
        let candidate = generate();
        if in_use(&candidate)? {
            warn!(kind, attempt, candidate = %candidate, "identifier collision, regenerating");
            continue;
        }
        match commit(candidate) {
            Err(RegistryError::DuplicateIdentifier(taken)) | Err(RegistryError::DuplicateCard(taken)) => {
                warn!(kind, attempt, candidate = %taken, "identifier taken by concurrent write, regenerating");
            }
            outcome => return outcome,
        }
    }
    Err(RegistryError::GenerationExhausted { kind, attempts })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn person_id_is_date_partitioned() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_person_id(date, 12345), "HLTH-20250307-12345");
        assert!(is_health_id(&format_person_id(date, 10000)));
    }

    #[test]
    fn random_identifiers_match_their_formats() {
        let source = RandomIdentifiers;
        for _ in 0..200 {
            let id = source.person_id();
            assert!(is_health_id(&id), "bad health id {id}");
            let card = source.card_number();
            assert!(is_card_number(&card), "bad card number {card}");
        }
    }

    #[test]
    fn rejects_malformed_health_ids() {
        for bad in [
            "",
            "HLTH-20250307",
            "HLTH-20250307-1234",
            "HLTH-20251307-12345",
            "ABHA-20250307-12345",
            "HLTH-20250307-12a45",
            "HLTH-20250307-12345-1",
        ] {
            assert!(!is_health_id(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn retries_until_a_free_candidate() {
        let calls = Cell::new(0);
        let issued = issue_unique(
            "health identifier",
            5,
            || {
                calls.set(calls.get() + 1);
                format!("candidate-{}", calls.get())
            },
            |candidate| Ok(candidate != "candidate-3"),
        )
        .unwrap();
        assert_eq!(issued, "candidate-3");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn repeated_collisions_exhaust() {
        let err = issue_unique("card number", 3, || "ABY-100000000000000".to_string(), |_| Ok(true))
            .unwrap_err();
        assert!(matches!(err, RegistryError::GenerationExhausted { attempts: 3, .. }));
    }

    #[test]
    fn commit_conflict_consumes_an_attempt() {
        let commits = Cell::new(0);
        let result = issue_and_commit(
            "card number",
            4,
            || format!("ABY-{:015}", 100_000_000_000_000u64 + commits.get()),
            |_| Ok(false),
            |candidate| {
                commits.set(commits.get() + 1);
                if commits.get() == 1 {
                    Err(RegistryError::DuplicateCard(candidate))
                } else {
                    Ok(candidate)
                }
            },
        )
        .unwrap();
        assert_eq!(commits.get(), 2);
        assert_eq!(result, "ABY-100000000000001");
    }

    #[test]
    fn other_commit_errors_are_not_retried() {
        let commits = Cell::new(0);
        let err = issue_and_commit(
            "card number",
            4,
            || "ABY-100000000000000".to_string(),
            |_| Ok(false),
            |_| -> RegistryResult<()> {
                commits.set(commits.get() + 1);
                Err(RegistryError::not_found("person", "HLTH-20250101-10000"))
            },
        )
        .unwrap_err();
        assert_eq!(commits.get(), 1);
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }
}
