//! Regex tables and validators for textual PII.

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::PiiKind;

/// Extra confidence when a birth-date match sits next to a DOB cue word.
const DOB_CONTEXT_BOOST: f64 = 0.1;

/// Words that promote a capitalized pair from heuristic to near-certain.
const HONORIFICS: &[&str] = &["Dr", "Mr", "Mrs", "Ms", "Prof"];

/// Capitalized words that end street-style phrases; a capitalized pair
/// ending in one of these is an address fragment, not a person name.
const STREET_SUFFIXES: &[&str] = &[
    "Street", "St", "Avenue", "Ave", "Road", "Rd", "Boulevard", "Blvd", "Lane", "Ln", "Drive",
    "Dr", "Court", "Ct", "Way", "Place", "Pl",
];

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    static ref PHONE: Regex =
        Regex::new(r"(?:\+?1[-. ])?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}").unwrap();
    static ref NATIONAL_ID: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();
    static ref IP_ADDRESS: Regex = Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap();
    static ref DATE: Regex =
        Regex::new(r"\b(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2})\b").unwrap();
    static ref DOB_CONTEXT: Regex = Regex::new(r"(?i)\b(?:dob|born|birth)\b").unwrap();
    static ref MRN: Regex = Regex::new(r"\b(?i:mrn)[:#]?\s*\d{6,10}\b").unwrap();
    static ref CARD_NUMBER: Regex = Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").unwrap();
    static ref POSTAL_ADDRESS: Regex = Regex::new(
        r"\b\d{1,5}\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\s+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl)\b"
    )
    .unwrap();
    static ref PERSON_NAME: Regex = Regex::new(
        r"\b(?:Dr|Mr|Mrs|Ms|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?|\b[A-Z][a-z]+\s+[A-Z][a-z]+\b"
    )
    .unwrap();
    static ref LICENSE_PLATE: Regex = Regex::new(r"\b[A-Z]{2,3}[- ]\d{3,4}\b").unwrap();
}

/// One match inside a span's text, as character offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub kind: PiiKind,
    pub char_start: usize,
    pub char_len: usize,
    pub text: String,
    pub confidence: f64,
}

/// Run every pattern over one span's text.
pub fn scan_text(text: &str) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    let has_dob_context = DOB_CONTEXT.is_match(text);

    collect(&EMAIL, text, PiiKind::Email, 0.95, &mut matches, |_| true);
    collect(&NATIONAL_ID, text, PiiKind::NationalId, 0.92, &mut matches, |_| true);
    collect(&PHONE, text, PiiKind::Phone, 0.85, &mut matches, |m| {
        // A 3-2-4 grouping is a national id, not a phone.
        !NATIONAL_ID.is_match(m)
    });
    collect(&IP_ADDRESS, text, PiiKind::IpAddress, 0.9, &mut matches, |m| {
        m.split('.').all(|octet| octet.parse::<u16>().map_or(false, |v| v <= 255))
    });
    collect(&MRN, text, PiiKind::MedicalRecordNumber, 0.9, &mut matches, |_| true);
    collect(
        &CARD_NUMBER,
        text,
        PiiKind::FinancialAccount,
        0.88,
        &mut matches,
        luhn_valid,
    );
    collect(&POSTAL_ADDRESS, text, PiiKind::PostalAddress, 0.8, &mut matches, |_| true);

    let dob_confidence = if has_dob_context {
        0.8 + DOB_CONTEXT_BOOST
    } else {
        0.8
    };
    collect(&DATE, text, PiiKind::DateOfBirth, dob_confidence, &mut matches, |_| true);

    collect_names(text, &mut matches);
    collect(&LICENSE_PLATE, text, PiiKind::LicensePlate, 0.6, &mut matches, |_| true);

    matches.sort_by_key(|m| (m.char_start, m.kind.tag()));
    matches
}

fn collect(
    regex: &Regex,
    text: &str,
    kind: PiiKind,
    confidence: f64,
    out: &mut Vec<PatternMatch>,
    accept: impl Fn(&str) -> bool,
) {
    for found in regex.find_iter(text) {
        if !accept(found.as_str()) {
            continue;
        }
        out.push(PatternMatch {
            kind,
            char_start: text[..found.start()].chars().count(),
            char_len: found.as_str().chars().count(),
            text: found.as_str().to_string(),
            confidence,
        });
    }
}

fn collect_names(text: &str, out: &mut Vec<PatternMatch>) {
    for found in PERSON_NAME.find_iter(text) {
        let matched = found.as_str();
        let words: Vec<&str> = matched.split_whitespace().collect();
        let has_honorific = words
            .first()
            .map(|w| HONORIFICS.contains(&w.trim_end_matches('.')))
            .unwrap_or(false);
        // "Main Street" and friends are addresses.
        if !has_honorific
            && words
                .last()
                .map(|w| STREET_SUFFIXES.contains(w))
                .unwrap_or(false)
        {
            continue;
        }
        out.push(PatternMatch {
            kind: PiiKind::PersonName,
            char_start: text[..found.start()].chars().count(),
            char_len: matched.chars().count(),
            text: matched.to_string(),
            confidence: if has_honorific { 0.9 } else { 0.72 },
        });
    }
}

/// Luhn checksum over the digits of a candidate account number.
pub fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
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
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_in(text: &str) -> Vec<PiiKind> {
        scan_text(text).into_iter().map(|m| m.kind).collect()
    }

    #[test]
    fn test_s1_line_yields_name_phone_email() {
        let matches = scan_text("John Doe 555-123-4567 jane@example.com");
        let kinds: Vec<PiiKind> = matches.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&PiiKind::PersonName));
        assert!(kinds.contains(&PiiKind::Phone));
        assert!(kinds.contains(&PiiKind::Email));
    }

    #[test]
    fn test_ssn_not_reported_as_phone() {
        let kinds = kinds_in("SSN 123-45-6789 on file");
        assert!(kinds.contains(&PiiKind::NationalId));
        assert!(!kinds.contains(&PiiKind::Phone));
    }

    #[test]
    fn test_char_offsets_for_multibyte_text() {
        let matches = scan_text("名前 jane@example.com");
        let email = matches.iter().find(|m| m.kind == PiiKind::Email).unwrap();
        // Two CJK chars plus a space before the match.
        assert_eq!(email.char_start, 3);
        assert_eq!(email.char_len, "jane@example.com".chars().count());
    }

    #[test]
    fn test_ip_octets_validated() {
        assert!(kinds_in("server at 10.0.254.3").contains(&PiiKind::IpAddress));
        assert!(!kinds_in("version 999.999.999.999").contains(&PiiKind::IpAddress));
    }

    #[test]
    fn test_luhn_filters_card_numbers() {
        // Standard test PAN passes, off-by-one fails.
        assert!(kinds_in("card 4539 1488 0343 6467").contains(&PiiKind::FinancialAccount));
        assert!(!kinds_in("card 4539 1488 0343 6468").contains(&PiiKind::FinancialAccount));
    }

    #[test]
    fn test_mrn_with_prefix() {
        assert!(kinds_in("MRN: 84729561").contains(&PiiKind::MedicalRecordNumber));
        assert!(!kinds_in("invoice 84729561").contains(&PiiKind::MedicalRecordNumber));
    }

    #[test]
    fn test_dob_context_boosts_confidence() {
        let plain = scan_text("delivered 03/04/1990");
        let contextual = scan_text("DOB: 03/04/1990");
        let plain_conf = plain
            .iter()
            .find(|m| m.kind == PiiKind::DateOfBirth)
            .unwrap()
            .confidence;
        let ctx_conf = contextual
            .iter()
            .find(|m| m.kind == PiiKind::DateOfBirth)
            .unwrap()
            .confidence;
        assert!(ctx_conf > plain_conf);
    }

    #[test]
    fn test_street_names_not_person_names() {
        let matches = scan_text("lives at 42 Main Street in town");
        assert!(matches.iter().any(|m| m.kind == PiiKind::PostalAddress));
        assert!(!matches.iter().any(|m| m.kind == PiiKind::PersonName));
    }

    #[test]
    fn test_honorific_raises_name_confidence() {
        let plain = scan_text("patient John Doe presented");
        let titled = scan_text("seen by Dr. Chen today");
        let plain_conf = plain
            .iter()
            .find(|m| m.kind == PiiKind::PersonName)
            .unwrap()
            .confidence;
        let titled_conf = titled
            .iter()
            .find(|m| m.kind == PiiKind::PersonName)
            .unwrap()
            .confidence;
        assert!(titled_conf > plain_conf);
    }

    #[test]
    fn test_matches_sorted_by_position() {
        let matches = scan_text("a@b.io then 192.168.0.1");
        let starts: Vec<usize> = matches.iter().map(|m| m.char_start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }
}
