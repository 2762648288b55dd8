//! Free-text grounding checks.
//!
//! Generated prose may only cite numbers that exist in its grounding record,
//! and may not lean on authority phrases that smuggle in claims no record
//! backs up.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    // \b\d+\.?\d*\b picks up integers and decimals, not signs or units
    Regex::new(r"\b\d+\.?\d*\b").expect("static number pattern compiles")
});

/// Hedge/authority phrases that reject a text outright, case-insensitive.
const HEDGE_PHRASES: [&str; 10] = [
    "studies show",
    "research indicates",
    "typically",
    "on average",
    "usually",
    "according to",
    "industry benchmark",
    "best practice suggests",
    "experts recommend",
    "data suggests",
];

/// Numbers small enough that they are unlikely to be fabricated statistics.
const SMALL_NUMBER_CUTOFF: f64 = 10.0;

/// Round percentages that appear in template prose regardless of the record.
const SAFE_NUMBERS: [f64; 6] = [25.0, 30.0, 50.0, 70.0, 75.0, 100.0];

/// Relative tolerance when matching a cited number to a grounding value.
const RELATIVE_TOLERANCE: f64 = 0.1;

/// One violation per hedge phrase found in the text.
pub fn lexical_violations(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    HEDGE_PHRASES
        .iter()
        .filter(|phrase| lowered.contains(*phrase))
        .map(|phrase| format!("Ungrounded claim phrase: '{}'", phrase))
        .collect()
}

/// Every numeric token in `text` must be traceable to some value in
/// `grounding` (within relative tolerance, or within 1 of its whole-number
/// rounding). Small numbers and safe round percentages are skipped.
pub fn numeric_violations(text: &str, grounding: &[f64]) -> Vec<String> {
    let allowed = allowed_numbers(grounding);

    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|num| *num > SMALL_NUMBER_CUTOFF)
        .filter(|num| !SAFE_NUMBERS.contains(num))
        .filter(|num| !is_grounded(*num, &allowed))
        .map(|num| format!("Number {} not found in grounding data", num))
        .collect()
}

/// Grounding values normalized: absolute, rounded to 2 decimals, plus a
/// whole-number variant for values above 1 (prose often rounds).
fn allowed_numbers(grounding: &[f64]) -> Vec<f64> {
    let mut allowed = Vec::with_capacity(grounding.len() * 2);
    for value in grounding {
        if *value == 0.0 {
            continue;
        }
        let v = crate::utils::round2(value.abs());
        allowed.push(v);
        if v > 1.0 {
            allowed.push(v.round());
        }
    }
    allowed
}

fn is_grounded(num: f64, allowed: &[f64]) -> bool {
    allowed.iter().any(|a| {
        (num - a).abs() <= a.abs() * RELATIVE_TOLERANCE || (num - a.round()).abs() <= 1.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hedge_phrase_rejected_case_insensitive() {
        let violations = lexical_violations("This beats the Industry Benchmark by far");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("industry benchmark"));
    }

    #[test]
    fn test_clean_text_has_no_lexical_violations() {
        assert!(lexical_violations("Spend was reduced by 50% to stop losses").is_empty());
    }

    #[test]
    fn test_cited_spend_matches_grounding() {
        let violations = numeric_violations("Current spend of 1000 is at risk", &[1000.0]);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_fabricated_number_flagged() {
        let violations = numeric_violations("Peers spend 999999 on this", &[1000.0, 0.3]);
        assert_eq!(violations, vec!["Number 999999 not found in grounding data"]);
    }

    #[test]
    fn test_small_numbers_and_safe_percentages_skipped() {
        let violations =
            numeric_violations("Cutting 50% now, 7 days left, maybe 25% later", &[482.5]);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_relative_tolerance_and_rounding() {
        // 1050 is within 10% of 1000
        assert!(numeric_violations("about 1050 dollars", &[1000.0]).is_empty());
        // 483 rounds against 482.5
        assert!(numeric_violations("about 483 dollars", &[482.5]).is_empty());
        assert!(!numeric_violations("about 1200 dollars", &[1000.0]).is_empty());
    }
}
