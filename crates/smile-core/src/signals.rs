//! Mapping from face attributes to smile sub-scores.

use crate::analysis::{AnalysisOutcome, BoolAttribute, FaceAttributes};

const HAPPY: &str = "HAPPY";

/// Sub-scores (0–100) for the most confident face:
/// `[smile, happy emotion, mouth open]`.
///
/// No face yields an empty sequence.
pub fn smile_scores(attrs: &FaceAttributes) -> Vec<f64> {
    let Some(face) = attrs.primary_face() else {
        return Vec::new();
    };
    vec![
        face.smile.map(leaning).unwrap_or(0.0),
        face.emotion(HAPPY).map(clamp_score).unwrap_or(0.0),
        face.mouth_open.map(leaning).unwrap_or(0.0),
    ]
}

/// Sub-scores for an analysis outcome. An absent result contributes nothing.
pub fn outcome_scores(outcome: &AnalysisOutcome) -> Vec<f64> {
    outcome.attributes().map(smile_scores).unwrap_or_default()
}

/// Confidence that the attribute is present: `confidence` when the service
/// says yes, `100 - confidence` when it says no.
fn leaning(attr: BoolAttribute) -> f64 {
    let c = clamp_score(attr.confidence);
    if attr.value {
        c
    } else {
        100.0 - c
    }
}

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}
