//! Face landmark detection behind a small trait so the render loop does not
//! care which model produced the faces.

pub mod session;
pub mod yunet;

use crate::error::DetectorError;
use crate::face::{EyeAnchors, Face};
use opencv::core::Mat;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub use session::{DetectorSession, SessionState};
pub use yunet::YuNetDetector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimateOptions {
    /// Mirror the frame before inference so results line up with a mirrored display.
    pub flip_horizontal: bool,
}

pub trait FaceLandmarkDetector: Send + Sync {
    /// Keypoints marking the outer eye corners in this detector's output.
    fn eye_anchors(&self) -> EyeAnchors;

    /// Blocking inference on one frame.
    fn estimate_faces(
        &self,
        frame: &Mat,
        options: EstimateOptions,
    ) -> Result<Vec<Face>, DetectorError>;
}

pub type SharedDetector = Arc<dyn FaceLandmarkDetector>;

/// Run detection on the blocking pool.
pub fn spawn_estimate(
    detector: SharedDetector,
    frame: Mat,
    options: EstimateOptions,
) -> JoinHandle<Result<Vec<Face>, DetectorError>> {
    tokio::task::spawn_blocking(move || detector.estimate_faces(&frame, options))
}
