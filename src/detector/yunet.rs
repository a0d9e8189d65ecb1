//! OpenCV YuNet face detector.
//!
//! Output rows are `[x, y, w, h, x_re, y_re, x_le, y_le, x_n, y_n, x_mr, y_mr,
//! x_ml, y_ml, score]`: the box, five landmarks (eye on the image left, eye on
//! the image right, nose tip, mouth corners) and the confidence.

use super::{EstimateOptions, FaceLandmarkDetector, SharedDetector};
use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::face::{BoundingBox, EyeAnchors, Face, Keypoint};
use crate::model_resolver;
use log::{debug, info};
use opencv::core::{self, Mat, Ptr, Size};
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::*;
use opencv::{dnn, imgproc};
use std::path::Path;
use std::sync::{Arc, Mutex};

const LANDMARK_COUNT: i32 = 5;
const ROW_LENGTH: i32 = 15;
const TOP_K: i32 = 5000;

pub struct YuNetDetector {
    detector: Mutex<Ptr<FaceDetectorYN>>,
    config: DetectorConfig,
}

impl YuNetDetector {
    pub const EYE_ANCHORS: EyeAnchors = EyeAnchors::new(0, 1);

    pub fn new(model_path: &Path, config: DetectorConfig) -> Result<Self, DetectorError> {
        let model = model_path.to_string_lossy();
        // real input size is set per frame
        let detector = FaceDetectorYN::create(
            &model,
            "",
            Size::new(320, 320),
            config.score_threshold,
            config.nms_threshold,
            TOP_K,
            dnn::DNN_BACKEND_DEFAULT,
            dnn::DNN_TARGET_CPU,
        )
        .map_err(|e| DetectorError::Initialization(e.to_string()))?;

        info!(
            "YuNet detector created from {} (max faces {}, refine landmarks {})",
            model, config.max_faces, config.refine_landmarks
        );
        Ok(Self {
            detector: Mutex::new(detector),
            config,
        })
    }

    /// Resolve the model file and build the detector off the async runtime.
    pub async fn create(config: DetectorConfig) -> anyhow::Result<SharedDetector> {
        let detector = tokio::task::spawn_blocking(move || -> anyhow::Result<SharedDetector> {
            let model_path =
                model_resolver::resolve(config.model.file_name(), &config.model_url())?;
            Ok(Arc::new(YuNetDetector::new(&model_path, config)?))
        })
        .await??;
        Ok(detector)
    }

    fn detect(&self, input: &Mat) -> Result<Mat, DetectorError> {
        let mut detector = self
            .detector
            .lock()
            .map_err(|_| DetectorError::Detection("detector lock poisoned".to_string()))?;
        detector.set_input_size(input.size()?)?;
        let mut faces = Mat::default();
        detector.detect(input, &mut faces)?;
        Ok(faces)
    }
}

impl FaceLandmarkDetector for YuNetDetector {
    fn eye_anchors(&self) -> EyeAnchors {
        Self::EYE_ANCHORS
    }

    fn estimate_faces(
        &self,
        frame: &Mat,
        options: EstimateOptions,
    ) -> Result<Vec<Face>, DetectorError> {
        if frame.empty() {
            return Ok(Vec::new());
        }

        let mut mirrored = Mat::default();
        let frame = if options.flip_horizontal {
            core::flip(frame, &mut mirrored, 1)?;
            &mirrored
        } else {
            frame
        };

        let mut reduced = Mat::default();
        let (input, scale) = if self.config.refine_landmarks {
            (frame, 1.0)
        } else {
            imgproc::resize(
                frame,
                &mut reduced,
                Size::new(0, 0),
                0.5,
                0.5,
                imgproc::INTER_AREA,
            )?;
            (&reduced, frame.cols() as f32 / reduced.cols().max(1) as f32)
        };

        let raw = self.detect(input)?;
        let faces = parse_faces(&raw, scale, self.config.max_faces)?;
        debug!("YuNet found {} faces", faces.len());
        Ok(faces)
    }
}

fn parse_faces(raw: &Mat, scale: f32, max_faces: usize) -> Result<Vec<Face>, DetectorError> {
    if raw.empty() || raw.cols() < ROW_LENGTH {
        return Ok(Vec::new());
    }

    let rows = (raw.rows().max(0) as usize).min(max_faces);
    let mut faces = Vec::with_capacity(rows);
    for row in 0..rows as i32 {
        let value = |col: i32| raw.at_2d::<f32>(row, col).copied();

        let bounding_box = BoundingBox::new(value(0)?, value(1)?, value(2)?, value(3)?);
        if bounding_box.width <= 0.0 || bounding_box.height <= 0.0 {
            continue;
        }

        let mut keypoints = Vec::with_capacity(LANDMARK_COUNT as usize);
        for landmark in 0..LANDMARK_COUNT {
            let col = 4 + landmark * 2;
            keypoints.push(Keypoint::new(value(col)?, value(col + 1)?).scaled(scale));
        }

        faces.push(Face::new(bounding_box.scaled(scale), keypoints));
    }
    Ok(faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detections(rows: &[[f32; 15]]) -> Mat {
        Mat::from_slice_2d(rows).unwrap()
    }

    fn row(x: f32, y: f32) -> [f32; 15] {
        [
            x, y, 40.0, 50.0, // box
            x + 10.0, y + 15.0, x + 30.0, y + 15.0, // eyes
            x + 20.0, y + 25.0, // nose
            x + 12.0, y + 38.0, x + 28.0, y + 38.0, // mouth
            0.9,
        ]
    }

    #[test]
    fn rows_become_faces_with_five_keypoints() {
        let faces = parse_faces(&detections(&[row(10.0, 20.0)]), 1.0, 5).unwrap();

        assert_eq!(faces.len(), 1);
        let face = &faces[0];
        assert_eq!(face.bounding_box, Some(BoundingBox::new(10.0, 20.0, 40.0, 50.0)));
        assert_eq!(face.keypoints.len(), 5);
        let anchors = YuNetDetector::EYE_ANCHORS;
        assert!(face.keypoint(anchors.left).unwrap().x < face.keypoint(anchors.right).unwrap().x);
    }

    #[test]
    fn results_are_capped_at_max_faces() {
        let raw = detections(&[row(0.0, 0.0), row(100.0, 0.0), row(200.0, 0.0)]);
        assert_eq!(parse_faces(&raw, 1.0, 2).unwrap().len(), 2);
    }

    #[test]
    fn reduced_input_is_scaled_back() {
        let faces = parse_faces(&detections(&[row(10.0, 20.0)]), 2.0, 5).unwrap();
        assert_eq!(
            faces[0].bounding_box,
            Some(BoundingBox::new(20.0, 40.0, 80.0, 100.0))
        );
        assert_eq!(faces[0].keypoints[0], Keypoint::new(40.0, 70.0));
    }

    #[test]
    fn empty_output_has_no_faces() {
        assert!(parse_faces(&Mat::default(), 1.0, 5).unwrap().is_empty());
    }
}
