use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DetectorError {
    #[error("failed to create face detector: {0}")]
    Initialization(String),
    #[error("detector creation was abandoned before it finished")]
    Abandoned,
    #[error("face detection failed: {0}")]
    Detection(String),
}

impl From<opencv::Error> for DetectorError {
    fn from(error: opencv::Error) -> Self {
        DetectorError::Detection(error.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to parse svg: {0}")]
    Svg(String),
    #[error("svg has an empty canvas")]
    EmptySvg,
    #[error("image data could not be decoded")]
    Undecodable,
    #[error("unsupported image layout: {channels} channels")]
    UnsupportedLayout { channels: i32 },
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Opencv error {0}")]
    OpenCv(#[from] opencv::Error),
}

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ErrorWrapper {
    #[error("Zenoh error {0:?}")]
    ZenohError(#[from] zenoh::Error),
}
