//! Pre-analysis tier score: a cheap triage number based only on which
//! sources are present.

/// Minimum tier score for automatic full analysis.
pub const ELIGIBILITY_THRESHOLD: u8 = 30;

pub fn tier_score(has_linkedin: bool, has_cv: bool) -> u8 {
    match (has_linkedin, has_cv) {
        (true, true) => 30,
        (true, false) => 20,
        (false, true) => 15,
        (false, false) => 10,
    }
}

pub fn is_eligible_for_full_analysis(score: u8) -> bool {
    score >= ELIGIBILITY_THRESHOLD
}
