//! Distance-to-score conversion policies.

use serde::{Deserialize, Serialize};

/// Fixed policies for turning a raw index distance into a normalized score.
///
/// All three are monotonically non-increasing in distance, so the index
/// engine's ordering is preserved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// `1 / (1 + d)` — distance in `[0, inf)` maps into `(0, 1]`.
    #[default]
    Reciprocal,
    /// `-d` — preserves ordering with an unbounded range; useful when the
    /// "distance" is already score-like (inner product).
    Negative,
    /// `max(0, 1 - d)` — clamped; assumes distance roughly in `[0, 1]`.
    Linear,
}

impl ScoreMode {
    /// Converts a raw distance into a score under this policy.
    #[must_use]
    pub fn convert(self, distance: f32) -> f32 {
        match self {
            Self::Reciprocal => 1.0 / (1.0 + distance),
            Self::Negative => -distance,
            Self::Linear => (1.0 - distance).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [ScoreMode; 3] = [ScoreMode::Reciprocal, ScoreMode::Negative, ScoreMode::Linear];

    #[test]
    fn monotonically_decreasing() {
        let pairs = [(0.0, 0.1), (0.1, 0.5), (0.5, 1.0), (1.0, 4.0), (4.0, 100.0)];
        for mode in MODES {
            for (d1, d2) in pairs {
                assert!(
                    mode.convert(d1) >= mode.convert(d2),
                    "{mode:?} not monotone at ({d1}, {d2})"
                );
            }
        }
    }

    #[test]
    fn reciprocal_range() {
        assert_eq!(ScoreMode::Reciprocal.convert(0.0), 1.0);
        let far = ScoreMode::Reciprocal.convert(1e6);
        assert!(far > 0.0 && far < 1e-5);
    }

    #[test]
    fn linear_clamps_at_zero() {
        assert_eq!(ScoreMode::Linear.convert(2.5), 0.0);
        assert_eq!(ScoreMode::Linear.convert(0.25), 0.75);
    }

    #[test]
    fn negative_preserves_ordering() {
        assert_eq!(ScoreMode::Negative.convert(0.5), -0.5);
        assert!(ScoreMode::Negative.convert(0.1) > ScoreMode::Negative.convert(0.2));
    }
}
