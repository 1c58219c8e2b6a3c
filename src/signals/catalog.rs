//! Static registry of authenticity signals.
//!
//! Partitioned into LinkedIn-only, CV-only and combined groups; [`catalog`]
//! concatenates them in that order. Adding a signal is a code change.

use once_cell::sync::Lazy;
use serde::Serialize;

/// One named authenticity check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub name: &'static str,
    pub description: &'static str,
    /// Weight in [0,1] used by the importance-weighted average.
    pub importance: f32,
    #[serde(rename = "requiresCV")]
    pub requires_cv: bool,
    #[serde(rename = "requiresLinkedIn")]
    pub requires_linkedin: bool,
}

impl Signal {
    const fn linkedin(name: &'static str, description: &'static str, importance: f32) -> Self {
        Self {
            name,
            description,
            importance,
            requires_cv: false,
            requires_linkedin: true,
        }
    }

    const fn cv(name: &'static str, description: &'static str, importance: f32) -> Self {
        Self {
            name,
            description,
            importance,
            requires_cv: true,
            requires_linkedin: false,
        }
    }

    const fn combined(name: &'static str, description: &'static str, importance: f32) -> Self {
        Self {
            name,
            description,
            importance,
            requires_cv: true,
            requires_linkedin: true,
        }
    }
}

pub const LINKEDIN_SIGNALS: &[Signal] = &[
    Signal::linkedin(
        "Profile completeness",
        "The LinkedIn profile has a photo, headline, summary and a populated experience section.",
        0.6,
    ),
    Signal::linkedin(
        "Account maturity",
        "The profile looks established over years rather than recently created for this application.",
        0.8,
    ),
    Signal::linkedin(
        "Network authenticity",
        "Connection count and network composition look organically grown for the stated career.",
        0.5,
    ),
    Signal::linkedin(
        "Endorsement credibility",
        "Skill endorsements and recommendations come from plausible colleagues, not reciprocal farms.",
        0.4,
    ),
    Signal::linkedin(
        "Activity history",
        "The profile shows posts, comments or other engagement spread over time.",
        0.3,
    ),
];

pub const CV_SIGNALS: &[Signal] = &[
    Signal::cv(
        "Timeline coherence",
        "Employment and education dates are ordered, non-overlapping where they must be, and gaps are explained.",
        0.8,
    ),
    Signal::cv(
        "Experience realism",
        "Seniority, scope and responsibilities are realistic for the years of experience claimed.",
        0.7,
    ),
    Signal::cv(
        "Skill specificity",
        "Skills are concrete and tied to roles or projects rather than generic keyword lists.",
        0.5,
    ),
    Signal::cv(
        "Quantified achievements",
        "Achievements are stated with verifiable specifics such as numbers, products or clients.",
        0.4,
    ),
    Signal::cv(
        "Education plausibility",
        "Institutions, degrees and graduation years are plausible and consistent with the career start.",
        0.6,
    ),
    Signal::cv(
        "Contact details",
        "The CV carries a consistent name, a professional email and reachable contact information.",
        0.3,
    ),
];

pub const COMBINED_SIGNALS: &[Signal] = &[
    Signal::combined(
        "Identity match",
        "The name and location on the CV match the LinkedIn profile.",
        1.0,
    ),
    Signal::combined(
        "Employment history match",
        "Employers listed on the CV appear on LinkedIn with compatible dates.",
        0.9,
    ),
    Signal::combined(
        "Title alignment",
        "Job titles agree between CV and LinkedIn without unexplained inflation.",
        0.7,
    ),
    Signal::combined(
        "Education match",
        "Degrees and institutions agree between CV and LinkedIn.",
        0.7,
    ),
    Signal::combined(
        "Skills overlap",
        "Core skills on the CV are reflected in the LinkedIn skills and experience.",
        0.5,
    ),
];

static CATALOG: Lazy<Vec<Signal>> = Lazy::new(|| {
    LINKEDIN_SIGNALS
        .iter()
        .chain(CV_SIGNALS)
        .chain(COMBINED_SIGNALS)
        .copied()
        .collect()
});

/// The full catalog in evaluation order.
pub fn catalog() -> &'static [Signal] {
    &CATALOG
}
