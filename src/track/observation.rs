use crate::math::Transform;

/// Result of looking for the marker in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerObservation {
    /// Camera-relative marker pose, when found.
    pub transform: Option<Transform>,
    /// Match confidence of the detected pattern (0..1).
    pub confidence: f32,
}

impl MarkerObservation {
    pub fn found(transform: Transform, confidence: f32) -> Self {
        Self {
            transform: Some(transform),
            confidence,
        }
    }

    pub fn lost() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.transform.is_some()
    }
}
