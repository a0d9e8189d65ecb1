use crate::error::ConfigError;
use crate::geometry::{OverlayKind, PlacementTuning};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TOPIC: &str = "face-tracker/image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelVariant {
    #[default]
    #[serde(rename = "yunet_2023mar")]
    Yunet2023Mar,
    #[serde(rename = "yunet_2023mar_int8bq")]
    Yunet2023MarInt8Bq,
}

impl ModelVariant {
    pub fn file_name(self) -> &'static str {
        match self {
            ModelVariant::Yunet2023Mar => "face_detection_yunet_2023mar.onnx",
            ModelVariant::Yunet2023MarInt8Bq => "face_detection_yunet_2023mar_int8bq.onnx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model: ModelVariant,
    /// Run inference at full frame resolution instead of half.
    pub refine_landmarks: bool,
    pub max_faces: usize,
    /// Directory the model files are fetched from.
    pub solution_path: String,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: ModelVariant::default(),
            refine_landmarks: true,
            max_faces: 5,
            solution_path:
                "https://github.com/opencv/opencv_zoo/raw/main/models/face_detection_yunet"
                    .to_string(),
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}

impl DetectorConfig {
    pub fn model_url(&self) -> String {
        format!(
            "{}/{}",
            self.solution_path.trim_end_matches('/'),
            self.model.file_name()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: i32,
    /// Show the camera as a mirror image.
    pub mirror: bool,
    pub filter: OverlayKind,
    pub tuning: PlacementTuning,
    pub detector: DetectorConfig,
    /// Image used for the logo filter and watermark instead of the built in one.
    pub logo: Option<PathBuf>,
    pub custom_image: Option<PathBuf>,
    pub topic: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: 0,
            mirror: true,
            filter: OverlayKind::default(),
            tuning: PlacementTuning::default(),
            detector: DetectorConfig::default(),
            logo: None,
            custom_image: None,
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            tuning: config.tuning.clamped(),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_takes_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{ "filter": "glasses", "tuning": { "scale": 9.0 },
                "detector": { "max_faces": 2 } }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.filter, OverlayKind::Glasses);
        assert_eq!(config.tuning.scale, 2.2);
        assert_eq!(config.tuning.y_offset, -20.0);
        assert_eq!(config.detector.max_faces, 2);
        assert!(config.detector.refine_landmarks);
        assert!(config.mirror);
        assert_eq!(config.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn broken_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let error = AppConfig::load(&path).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("config.json"));
    }

    #[test]
    fn model_url_joins_solution_path() {
        let config = DetectorConfig {
            solution_path: "https://example.com/models/".to_string(),
            model: ModelVariant::Yunet2023MarInt8Bq,
            ..Default::default()
        };
        assert_eq!(
            config.model_url(),
            "https://example.com/models/face_detection_yunet_2023mar_int8bq.onnx"
        );
    }

    #[test]
    fn model_variant_names() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{ "model": "yunet_2023mar_int8bq" }"#).unwrap();
        assert_eq!(config.model, ModelVariant::Yunet2023MarInt8Bq);
        assert_eq!(
            serde_json::to_string(&ModelVariant::Yunet2023Mar).unwrap(),
            "\"yunet_2023mar\""
        );
    }
}
