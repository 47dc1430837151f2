//! Recommendation catalog.
//!
//! A fixed table keyed by classification label. Both the gated and the close-up
//! branches of the analyzer read from this table.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::report::AnalysisStatus;

/// Classification labels known to the catalog.
///
/// Labels the classifier emits outside this set are kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HealthLabel {
    Healthy,
    Bumblefoot,
    CombInjury,
    FeatherLoss,
    WingInjury,
    Other(String),
}

impl HealthLabel {
    /// Case-insensitive match against the known labels.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "healthy" => HealthLabel::Healthy,
            "bumblefoot" => HealthLabel::Bumblefoot,
            "comb_injury" => HealthLabel::CombInjury,
            "feather_loss" => HealthLabel::FeatherLoss,
            "wing_injury" => HealthLabel::WingInjury,
            _ => HealthLabel::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HealthLabel::Healthy => "healthy",
            HealthLabel::Bumblefoot => "bumblefoot",
            HealthLabel::CombInjury => "comb_injury",
            HealthLabel::FeatherLoss => "feather_loss",
            HealthLabel::WingInjury => "wing_injury",
            HealthLabel::Other(label) => label,
        }
    }

    /// Human-readable title, e.g. `comb_injury` -> `Comb Injury`.
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for HealthLabel {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(raw))
    }
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HealthLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Static findings and recommendations for one label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub findings: &'static [&'static str],
    pub recommendations: &'static [&'static str],
}

/// Findings and recommendations attached to a report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assessment {
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Remediation guidance for an analysis that did not complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Remediation {
    pub primary_issue: &'static str,
    pub recommendations: &'static [&'static str],
}

const BUMBLEFOOT: CatalogEntry = CatalogEntry {
    findings: &["Bumblefoot detected in foot area"],
    recommendations: &[
        "BUMBLEFOOT DETECTED - Immediate attention required",
        "Examine foot pads for swelling, heat, or black scabs",
        "Check for limping or favoring one foot",
        "Isolate bird to prevent spread and allow treatment",
        "Consult veterinarian for proper bumblefoot treatment",
        "Clean and disinfect coop areas, especially perches",
        "Review perch design - avoid sharp edges or rough surfaces",
    ],
};

const COMB_INJURY: CatalogEntry = CatalogEntry {
    findings: &["Head/comb area shows abnormalities"],
    recommendations: &[
        "COMB/WATTLE INJURY DETECTED - Attention required",
        "Examine comb and wattles for wounds, tears, or bleeding",
        "Check for signs of fighting or pecking from other birds",
        "Clean wounds with antiseptic solution",
        "Apply antibiotic ointment to prevent infection",
        "Isolate bird if injury is severe or bleeding",
        "Monitor for signs of infection (swelling, pus, heat)",
        "Consult veterinarian if injury does not improve in 2-3 days",
    ],
};

const FEATHER_LOSS: CatalogEntry = CatalogEntry {
    findings: &["Visible feather loss or bare patches detected"],
    recommendations: &[
        "FEATHER LOSS DETECTED - Investigation needed",
        "Check for external parasites (mites, lice)",
        "Examine for signs of pecking or bullying from flock mates",
        "Assess nutrition - ensure adequate protein (16-20%)",
        "Consider molting season (normal seasonal feather loss)",
        "Check for skin irritation or infection under bare patches",
        "Improve coop ventilation and reduce stress factors",
        "Provide dust bath area for parasite control",
        "Consult veterinarian if feather loss is severe or spreading",
    ],
};

const WING_INJURY: CatalogEntry = CatalogEntry {
    findings: &["Wing abnormality detected"],
    recommendations: &[
        "WING INJURY DETECTED - Immediate attention required",
        "Check for wing drooping, asymmetry, or limited movement",
        "Examine wing joints for swelling, heat, or pain",
        "Look for fractures, dislocations, or sprains",
        "Restrict movement - confine to small, quiet area",
        "Avoid handling the injured wing excessively",
        "Consult veterinarian for proper diagnosis and treatment",
        "May require splinting or bandaging by professional",
        "Monitor for signs of infection or worsening condition",
    ],
};

const HEALTHY: CatalogEntry = CatalogEntry {
    findings: &["No visible health issues detected"],
    recommendations: &[
        "Rooster appears healthy based on AI analysis",
        "Continue regular health monitoring",
        "Maintain good nutrition and housing conditions",
        "Schedule routine veterinary check-ups",
        "Monitor for early signs of injury or illness",
        "Ensure clean water and balanced diet",
        "Provide adequate space and enrichment",
    ],
};

const UNRECOGNIZED: CatalogEntry = CatalogEntry {
    findings: &["Classification did not match a known condition"],
    recommendations: &[
        "Review the image manually for visible injuries",
        "Continue regular health monitoring",
        "Consult veterinarian if the bird shows signs of illness",
    ],
};

const POSE_FAILED: Remediation = Remediation {
    primary_issue: "Unable to detect rooster pose",
    recommendations: &[
        "Ensure rooster is clearly visible in the image",
        "Use good lighting and clear background",
        "Position camera at rooster body level",
        "Try a different angle or distance",
    ],
};

const INSUFFICIENT_QUALITY: Remediation = Remediation {
    primary_issue: "Pose detection quality too low for reliable injury analysis",
    recommendations: &[
        "Improve image quality (lighting, focus, angle)",
        "Ensure rooster is fully visible",
        "Reduce background distractions",
        "Try capturing from a different angle",
    ],
};

const CLASSIFICATION_SKIPPED: Remediation = Remediation {
    primary_issue: "Injury analysis skipped due to pose quality",
    recommendations: &["Improve pose detection quality first"],
};

const CLASSIFICATION_FAILED: Remediation = Remediation {
    primary_issue: "Injury classification failed",
    recommendations: &[
        "Try with a different image",
        "Ensure image shows rooster clearly",
    ],
};

/// Label-keyed lookup of findings and recommendations.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecommendationCatalog;

impl RecommendationCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn lookup(&self, label: &HealthLabel) -> CatalogEntry {
        match label {
            HealthLabel::Bumblefoot => BUMBLEFOOT,
            HealthLabel::CombInjury => COMB_INJURY,
            HealthLabel::FeatherLoss => FEATHER_LOSS,
            HealthLabel::WingInjury => WING_INJURY,
            HealthLabel::Healthy => HEALTHY,
            HealthLabel::Other(_) => UNRECOGNIZED,
        }
    }

    /// Catalog entry for `label`, merged with pose anomalies when pose data exists.
    ///
    /// Only `wing_injury` consumes `pose_anomalies`: non-empty anomalies replace the
    /// generic finding and are echoed as a closing recommendation.
    pub fn assess(&self, label: &HealthLabel, pose_anomalies: Option<&[String]>) -> Assessment {
        let entry = self.lookup(label);
        let mut assessment = Assessment {
            findings: to_owned(entry.findings),
            recommendations: to_owned(entry.recommendations),
        };

        if *label == HealthLabel::WingInjury {
            if let Some(anomalies) = pose_anomalies.filter(|a| !a.is_empty()) {
                assessment.findings = anomalies.to_vec();
                assessment
                    .recommendations
                    .push(format!("Pose analysis confirms: {}", anomalies.join(", ")));
            }
        }
        assessment
    }

    /// Guidance for statuses other than `complete`.
    pub fn remediation(&self, status: AnalysisStatus) -> Option<Remediation> {
        match status {
            AnalysisStatus::PoseFailed => Some(POSE_FAILED),
            AnalysisStatus::InsufficientQuality => Some(INSUFFICIENT_QUALITY),
            AnalysisStatus::ClassificationSkipped => Some(CLASSIFICATION_SKIPPED),
            AnalysisStatus::ClassificationFailed => Some(CLASSIFICATION_FAILED),
            AnalysisStatus::Complete => None,
        }
    }
}

fn to_owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: [HealthLabel; 5] = [
        HealthLabel::Healthy,
        HealthLabel::Bumblefoot,
        HealthLabel::CombInjury,
        HealthLabel::FeatherLoss,
        HealthLabel::WingInjury,
    ];

    #[test]
    fn labels_parse_and_display() {
        for label in KNOWN {
            let parsed: HealthLabel = label.as_str().parse().unwrap();
            assert_eq!(parsed, label);
        }
        let parsed: HealthLabel = " Comb_Injury ".parse().unwrap();
        assert_eq!(parsed, HealthLabel::CombInjury);
        let other: HealthLabel = "scaly_leg".parse().unwrap();
        assert_eq!(other, HealthLabel::Other("scaly_leg".into()));
        assert_eq!(other.to_string(), "scaly_leg");
        assert_eq!(HealthLabel::FeatherLoss.title(), "Feather Loss");
    }

    #[test]
    fn every_label_has_distinct_non_empty_entry() {
        let catalog = RecommendationCatalog::new();
        for (i, a) in KNOWN.iter().enumerate() {
            let entry = catalog.lookup(a);
            assert!(!entry.findings.is_empty());
            assert!(!entry.recommendations.is_empty());
            for b in &KNOWN[i + 1..] {
                assert_ne!(entry, catalog.lookup(b));
            }
        }
        assert_eq!(
            catalog.lookup(&HealthLabel::Other("mystery".into())),
            UNRECOGNIZED
        );
    }

    #[test]
    fn lookup_is_idempotent() {
        let catalog = RecommendationCatalog::new();
        assert_eq!(
            catalog.assess(&HealthLabel::Bumblefoot, None),
            catalog.assess(&HealthLabel::Bumblefoot, None)
        );
    }

    #[test]
    fn wing_injury_merges_pose_anomalies() {
        let catalog = RecommendationCatalog::new();
        let anomalies = vec![
            "wing asymmetry detected".to_string(),
            "uneven leg positioning".to_string(),
        ];
        let assessment = catalog.assess(&HealthLabel::WingInjury, Some(&anomalies));
        assert_eq!(assessment.findings, anomalies);
        assert_eq!(
            assessment.recommendations.len(),
            WING_INJURY.recommendations.len() + 1
        );
        assert_eq!(
            assessment.recommendations.last().unwrap(),
            "Pose analysis confirms: wing asymmetry detected, uneven leg positioning"
        );
    }

    #[test]
    fn wing_injury_without_anomalies_uses_table() {
        let catalog = RecommendationCatalog::new();
        let plain = catalog.assess(&HealthLabel::WingInjury, None);
        assert_eq!(plain.findings, vec!["Wing abnormality detected"]);
        assert_eq!(catalog.assess(&HealthLabel::WingInjury, Some(&[])), plain);
    }

    #[test]
    fn other_labels_ignore_pose_anomalies() {
        let catalog = RecommendationCatalog::new();
        let anomalies = vec!["wing asymmetry detected".to_string()];
        assert_eq!(
            catalog.assess(&HealthLabel::Healthy, Some(&anomalies)),
            catalog.assess(&HealthLabel::Healthy, None)
        );
    }

    #[test]
    fn remediation_only_for_incomplete_statuses() {
        let catalog = RecommendationCatalog::new();
        assert!(catalog.remediation(AnalysisStatus::Complete).is_none());
        for status in [
            AnalysisStatus::PoseFailed,
            AnalysisStatus::InsufficientQuality,
            AnalysisStatus::ClassificationSkipped,
            AnalysisStatus::ClassificationFailed,
        ] {
            let remediation = catalog.remediation(status).unwrap();
            assert!(!remediation.recommendations.is_empty());
        }
    }
}
