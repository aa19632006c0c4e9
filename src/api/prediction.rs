//! Emotion classes and validated prediction results.
//!
//! The service replies with a JSON body of the form
//! `{ "emotion": "Happy", "confidence": 0.87, "probabilities": { ... } }`.
//! [`PredictResponse`] mirrors that wire shape; [`Prediction`] is the
//! validated form the rest of the crate consumes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance when checking that class probabilities sum to 1.
pub const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

// ---------------------------------------------------------------------------
// Emotion
// ---------------------------------------------------------------------------

/// The fixed set of emotion classes the service can predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Happy,
    Sad,
    Disgust,
}

impl Emotion {
    /// All classes, in the order the service reports them.
    pub const ALL: [Emotion; 4] = [Emotion::Angry, Emotion::Happy, Emotion::Sad, Emotion::Disgust];

    /// The label used on the wire and in log output.
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Disgust => "Disgust",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Emotion {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Angry" => Ok(Emotion::Angry),
            "Happy" => Ok(Emotion::Happy),
            "Sad" => Ok(Emotion::Sad),
            "Disgust" => Ok(Emotion::Disgust),
            other => Err(PredictionError::UnknownLabel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Probabilities
// ---------------------------------------------------------------------------

/// Per-class probabilities as reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    #[serde(rename = "Angry")]
    pub angry: f32,
    #[serde(rename = "Happy")]
    pub happy: f32,
    #[serde(rename = "Sad")]
    pub sad: f32,
    #[serde(rename = "Disgust")]
    pub disgust: f32,
}

impl Probabilities {
    /// Probability for one class.
    pub fn get(&self, emotion: Emotion) -> f32 {
        match emotion {
            Emotion::Angry => self.angry,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Disgust => self.disgust,
        }
    }

    /// Sum over all classes (should be 1 for a valid distribution).
    pub fn sum(&self) -> f32 {
        self.angry + self.happy + self.sad + self.disgust
    }
}

// ---------------------------------------------------------------------------
// PredictionError
// ---------------------------------------------------------------------------

/// Ways a service response can fail prediction validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("unknown emotion label {0:?}")]
    UnknownLabel(String),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f32),

    #[error("probability {1} for {0} outside [0, 1]")]
    ProbabilityOutOfRange(Emotion, f32),

    #[error("class probabilities sum to {0}, expected 1")]
    ProbabilitySum(f32),
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// One validated classification result.
///
/// Produced only by the classification client; invariants hold by
/// construction: the label is a known class, `confidence` and every class
/// probability are in `[0, 1]`, and the probabilities sum to 1 within
/// [`PROBABILITY_SUM_TOLERANCE`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub emotion: Emotion,
    pub confidence: f32,
    pub probabilities: Probabilities,
}

/// Wire shape of a successful `POST /predict` response.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub emotion: String,
    pub confidence: f32,
    pub probabilities: Probabilities,
}

impl TryFrom<PredictResponse> for Prediction {
    type Error = PredictionError;

    fn try_from(response: PredictResponse) -> Result<Self, Self::Error> {
        let emotion: Emotion = response.emotion.parse()?;

        if !(0.0..=1.0).contains(&response.confidence) {
            return Err(PredictionError::ConfidenceOutOfRange(response.confidence));
        }

        for class in Emotion::ALL {
            let p = response.probabilities.get(class);
            if !(0.0..=1.0).contains(&p) {
                return Err(PredictionError::ProbabilityOutOfRange(class, p));
            }
        }

        let sum = response.probabilities.sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(PredictionError::ProbabilitySum(sum));
        }

        Ok(Prediction {
            emotion,
            confidence: response.confidence,
            probabilities: response.probabilities,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
