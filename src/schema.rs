//! The canonical analysis result consumed by presentation views.
//!
//! Values of these types only come out of
//! [`crate::pipeline::validate::validate`], so every instance satisfies the
//! field and range constraints below. There is deliberately no
//! `Deserialize` impl: untrusted JSON has to go through the validator.
//!
//! Serialising produces the camelCase wire form the rubric prompt asks for.

use serde::Serialize;
use std::fmt;

/// Full verdict for one résumé. All four sections are always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overview: Overview,
    pub grammar_and_style: GrammarAndStyle,
    pub keywords: Keywords,
    pub suggestions: Suggestions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// 1–10.
    pub readability_score: u8,
    pub length: String,
    pub tone: String,
    pub structure: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarAndStyle {
    pub spelling_errors: u32,
    pub grammar_issues: u32,
    /// 0–100.
    #[serde(rename = "passiveVoice")]
    pub passive_voice_percent: f64,
    /// 1–10.
    pub clarity_score: u8,
    pub issues: Vec<StyleIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleIssue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "text")]
    pub excerpt: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Keywords {
    pub detected: Vec<DetectedKeyword>,
    /// Deduplicated, in the order the service listed them.
    pub missing: Vec<String>,
    /// ≥ 0.
    #[serde(rename = "density")]
    pub density_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedKeyword {
    pub keyword: String,
    /// ≥ 1.
    pub count: u32,
    pub relevance: Relevance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Low,
    Medium,
    High,
}

impl Relevance {
    /// Case-insensitive parse of the wire value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Relevance::Low),
            "medium" => Some(Relevance::Medium),
            "high" => Some(Relevance::High),
            _ => None,
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relevance::Low => "low",
            Relevance::Medium => "medium",
            Relevance::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    pub critical: Vec<String>,
    pub important: Vec<String>,
    pub minor: Vec<String>,
}

impl Suggestions {
    pub fn total(&self) -> usize {
        self.critical.len() + self.important.len() + self.minor.len()
    }
}

// ── Derived verdicts ─────────────────────────────────────────────────────

/// Badge shown next to the readability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadabilityVerdict {
    Good,
    NeedsImprovement,
}

/// Where the keyword density sits relative to the recommended 4–7 % band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityBand {
    TooLow,
    Optimal,
    TooHigh,
}

impl Overview {
    pub fn readability_verdict(&self) -> ReadabilityVerdict {
        if self.readability_score >= 7 {
            ReadabilityVerdict::Good
        } else {
            ReadabilityVerdict::NeedsImprovement
        }
    }
}

impl Keywords {
    pub fn density_band(&self) -> DensityBand {
        if self.density_percent < 4.0 {
            DensityBand::TooLow
        } else if self.density_percent > 7.0 {
            DensityBand::TooHigh
        } else {
            DensityBand::Optimal
        }
    }

    /// Detected keywords of the given relevance, in service order.
    pub fn with_relevance(&self, relevance: Relevance) -> impl Iterator<Item = &DetectedKeyword> {
        self.detected.iter().filter(move |k| k.relevance == relevance)
    }
}
