use crate::error::ErrorWrapper;
use anyhow::Context;
use clap::Args;
use log::{info, warn};
use opencv::core::{Mat, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, videoio};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use zenoh::prelude::r#async::*;

/// Where video frames come from.
pub trait FrameSource {
    fn is_ready(&self) -> bool;

    /// Next frame, or `None` when the source has nothing usable right now.
    fn next_frame(&mut self) -> impl Future<Output = anyhow::Result<Option<Mat>>> + Send;
}

pub struct CameraSource {
    capture: Arc<Mutex<videoio::VideoCapture>>,
}

fn lock_capture(capture: &Mutex<videoio::VideoCapture>) -> MutexGuard<'_, videoio::VideoCapture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_frame(capture: &mut videoio::VideoCapture) -> anyhow::Result<Option<Mat>> {
    let mut frame = Mat::default();
    capture.read(&mut frame)?;
    if frame.size()?.width == 0 {
        return Ok(None);
    }
    Ok(Some(frame))
}

impl CameraSource {
    pub fn new(index: i32) -> anyhow::Result<Self> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !videoio::VideoCapture::is_opened(&capture)? {
            anyhow::bail!("Unable to open camera {}", index);
        }
        info!("Opened camera {}", index);
        Ok(Self {
            capture: Arc::new(Mutex::new(capture)),
        })
    }

    /// Blocks until the camera delivers the next frame.
    pub fn read(&mut self) -> anyhow::Result<Option<Mat>> {
        read_frame(&mut lock_capture(&self.capture))
    }
}

impl FrameSource for CameraSource {
    fn is_ready(&self) -> bool {
        match self.capture.try_lock() {
            Ok(capture) => capture.is_opened().unwrap_or(false),
            // a read is in progress
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().is_opened().unwrap_or(false)
            }
        }
    }

    // the read runs on the blocking pool and paces the render loop at the
    // camera frame rate
    async fn next_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        let capture = self.capture.clone();
        tokio::task::spawn_blocking(move || read_frame(&mut lock_capture(&capture))).await?
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ZenohArgs {
    /// Endpoints to connect to.
    #[clap(short = 'e', long)]
    pub connect: Vec<zenoh_config::EndPoint>,

    /// Endpoints to listen on.
    #[clap(long)]
    pub listen: Vec<zenoh_config::EndPoint>,
}

impl ZenohArgs {
    pub fn is_empty(&self) -> bool {
        self.connect.is_empty() && self.listen.is_empty()
    }

    pub fn config(&self) -> Config {
        let mut zenoh_config = Config::default();
        if !self.listen.is_empty() {
            zenoh_config.listen.endpoints = self.listen.clone();
            info!(
                "Configured listening endpoints {:?}",
                zenoh_config.listen.endpoints
            );
        }
        if !self.connect.is_empty() {
            zenoh_config.connect.endpoints = self.connect.clone();
            info!(
                "Configured connect endpoints {:?}",
                zenoh_config.connect.endpoints
            );
        }
        zenoh_config
    }
}

/// JPEG frames published by `camera-driver` on another machine.
///
/// Only the newest frame is kept; frames arriving faster than the render
/// loop consumes them are dropped.
pub struct ZenohFrameSource {
    frames: watch::Receiver<Option<Arc<Vec<u8>>>>,
    receiver: JoinHandle<()>,
}

impl ZenohFrameSource {
    pub async fn subscribe(config: Config, topic: &str) -> anyhow::Result<Self> {
        let zenoh_session = zenoh::open(config)
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
        let zenoh_session = zenoh_session.into_arc();

        let subscriber = zenoh_session
            .declare_subscriber(topic.to_string())
            .best_effort()
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
        info!("Subscribed to camera frames on {}", topic);

        let (sender, frames) = watch::channel(None);
        let receiver = tokio::spawn(async move {
            let _session = zenoh_session;
            while let Ok(sample) = subscriber.recv_async().await {
                let payload: Vec<u8> = match sample.value.try_into() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Dropping malformed frame: {}", e);
                        continue;
                    }
                };
                if sender.send(Some(Arc::new(payload))).is_err() {
                    break;
                }
            }
        });

        Ok(Self { frames, receiver })
    }
}

impl Drop for ZenohFrameSource {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

impl FrameSource for ZenohFrameSource {
    fn is_ready(&self) -> bool {
        self.frames.borrow().is_some()
    }

    async fn next_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        self.frames
            .changed()
            .await
            .context("camera frame stream closed")?;
        let Some(jpeg) = self.frames.borrow_and_update().clone() else {
            return Ok(None);
        };
        match jpeg_to_mat(&jpeg) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                warn!("Skipping undecodable frame ({} bytes): {}", jpeg.len(), e);
                Ok(None)
            }
        }
    }
}

pub fn jpeg_to_mat(data: &[u8]) -> anyhow::Result<Mat> {
    let buffer = Vector::<u8>::from_slice(data);
    let frame = imgcodecs::imdecode(&buffer, imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        anyhow::bail!("Received frame is not a valid image");
    }
    Ok(frame)
}

pub fn mat_to_jpeg(frame: &Mat) -> anyhow::Result<Vec<u8>> {
    let mut buffer: Vector<u8> = Default::default();
    imgcodecs::imencode_def(".jpg", frame, &mut buffer)?;
    Ok(buffer.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Scalar};

    #[test]
    fn jpeg_frames_survive_transport() {
        let frame =
            Mat::new_rows_cols_with_default(48, 64, core::CV_8UC3, Scalar::all(128.0)).unwrap();
        let decoded = jpeg_to_mat(&mat_to_jpeg(&frame).unwrap()).unwrap();
        assert_eq!(decoded.size().unwrap(), frame.size().unwrap());
        assert_eq!(decoded.channels(), 3);
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        assert!(jpeg_to_mat(b"\xff\xd8 not really").is_err());
    }

    fn latest_frame_source() -> (watch::Sender<Option<Arc<Vec<u8>>>>, ZenohFrameSource) {
        let (sender, frames) = watch::channel(None);
        let receiver = tokio::spawn(async {});
        (sender, ZenohFrameSource { frames, receiver })
    }

    #[tokio::test]
    async fn corrupt_frames_are_skipped() {
        let (sender, mut source) = latest_frame_source();
        assert!(!source.is_ready());

        sender.send_replace(Some(Arc::new(b"\xff\xd8 junk".to_vec())));
        assert!(source.is_ready());
        assert!(source.next_frame().await.unwrap().is_none());

        let frame =
            Mat::new_rows_cols_with_default(24, 32, core::CV_8UC3, Scalar::all(64.0)).unwrap();
        sender.send_replace(Some(Arc::new(mat_to_jpeg(&frame).unwrap())));
        let decoded = source.next_frame().await.unwrap().unwrap();
        assert_eq!(decoded.size().unwrap(), frame.size().unwrap());
    }

    #[tokio::test]
    async fn closed_stream_is_an_error() {
        let (sender, mut source) = latest_frame_source();
        drop(sender);
        assert!(source.next_frame().await.is_err());
    }

    fn closed_camera() -> CameraSource {
        CameraSource {
            capture: Arc::new(Mutex::new(videoio::VideoCapture::default().unwrap())),
        }
    }

    #[tokio::test]
    async fn closed_camera_yields_no_frame() {
        let mut camera = closed_camera();
        assert!(!camera.is_ready());
        assert!(camera.next_frame().await.unwrap().is_none());
    }

    #[test]
    fn camera_stays_ready_while_a_read_holds_it() {
        let camera = closed_camera();
        let _reading = lock_capture(&camera.capture);
        assert!(camera.is_ready());
    }

    #[test]
    fn empty_zenoh_args_use_default_config() {
        let args = ZenohArgs::default();
        assert!(args.is_empty());
        let config = args.config();
        assert!(config.listen.endpoints.is_empty());
    }
}
