//! Per frame pipeline: show the camera, keep one detection running in the
//! background and paint the overlays of the last finished detection.
//!
//! Overlays trail the video by one detection. A pass never waits for the
//! detector; when the previous detection is still running, or the detector
//! is not loaded yet, the pass only redraws the video and an empty canvas.

use crate::canvas::Canvas;
use crate::detector::{spawn_estimate, DetectorSession, EstimateOptions};
use crate::error::DetectorError;
use crate::face::{EyeAnchors, Face};
use crate::geometry::{place_overlay, OverlayKind, PlacementTuning};
use crate::overlay::OverlayImage;
use crate::source::FrameSource;
use log::{debug, trace, warn};
use opencv::core::{self, Mat};
use opencv::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long to wait before retrying when the camera has no frame.
const IDLE_PASS: Duration = Duration::from_millis(16);

/// What to draw, as chosen in the UI.
#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub kind: OverlayKind,
    pub image: Option<Arc<OverlayImage>>,
    pub tuning: PlacementTuning,
}

/// Puts the finished frame on screen.
pub trait Presenter {
    fn present(&mut self, frame: &Mat, canvas: &Canvas) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Skipped,
    Rendered,
}

struct InFlight {
    handle: JoinHandle<Result<Vec<Face>, DetectorError>>,
    // overlays are drawn with the settings in force when detection started
    settings: RenderSettings,
    anchors: EyeAnchors,
}

pub struct RenderLoop<S, P> {
    session: DetectorSession,
    source: S,
    presenter: P,
    settings: watch::Receiver<RenderSettings>,
    canvas: Canvas,
    mirror: bool,
    in_flight: Option<InFlight>,
}

impl<S: FrameSource, P: Presenter> RenderLoop<S, P> {
    pub fn new(
        session: DetectorSession,
        source: S,
        presenter: P,
        settings: watch::Receiver<RenderSettings>,
        mirror: bool,
    ) -> Self {
        Self {
            session,
            source,
            presenter,
            settings,
            canvas: Canvas::new(),
            mirror,
            in_flight: None,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn detection_running(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| !in_flight.handle.is_finished())
    }

    pub async fn pass(&mut self) -> anyhow::Result<PassOutcome> {
        if !self.source.is_ready() {
            return Ok(PassOutcome::Skipped);
        }
        let Some(frame) = self.source.next_frame().await? else {
            return Ok(PassOutcome::Skipped);
        };

        let display = if self.mirror {
            let mut flipped = Mat::default();
            core::flip(&frame, &mut flipped, 1)?;
            flipped
        } else {
            frame.try_clone()?
        };

        if self.canvas.ensure_size(display.size()?)? {
            debug!("Canvas resized to {:?}", display.size()?);
        }
        self.canvas.clear()?;

        match self.session.get() {
            Some(detector) => {
                self.collect_detection().await;
                if self.in_flight.is_none() {
                    let settings = self.settings.borrow().clone();
                    let anchors = detector.eye_anchors();
                    let options = EstimateOptions {
                        flip_horizontal: self.mirror,
                    };
                    self.in_flight = Some(InFlight {
                        handle: spawn_estimate(detector, frame, options),
                        settings,
                        anchors,
                    });
                } else {
                    trace!("Detection still running");
                }
            }
            None => trace!("Detector not ready, showing video only"),
        }

        self.presenter.present(&display, &self.canvas)?;
        Ok(PassOutcome::Rendered)
    }

    async fn collect_detection(&mut self) {
        if self.detection_running() {
            return;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        match in_flight.handle.await {
            Ok(Ok(faces)) => self.draw_faces(&faces, &in_flight.settings, in_flight.anchors),
            Ok(Err(e)) => debug!("Face detection failed: {}", e),
            Err(e) => debug!("Face detection task failed: {}", e),
        }
    }

    fn draw_faces(&mut self, faces: &[Face], settings: &RenderSettings, anchors: EyeAnchors) {
        let Some(image) = &settings.image else {
            return;
        };
        for face in faces {
            let Some(instruction) =
                place_overlay(face, settings.kind, image.size(), &settings.tuning, anchors)
            else {
                continue;
            };
            if let Err(e) = self.canvas.draw(image, &instruction) {
                warn!("Failed to draw {} overlay: {}", settings.kind, e);
            }
        }
    }

    /// Run passes until `stop` turns true or its sender is dropped, or a pass fails.
    ///
    /// A detection still running when the loop ends is left to finish on its own.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> anyhow::Result<()> {
        while !*stop.borrow() && stop.has_changed().is_ok() {
            // a source may wait indefinitely for its next frame
            let outcome = tokio::select! {
                outcome = self.pass() => outcome?,
                _ = stop.changed() => break,
            };
            match outcome {
                PassOutcome::Rendered => tokio::task::yield_now().await,
                PassOutcome::Skipped => {
                    tokio::select! {
                        _ = stop.changed() => {}
                        _ = tokio::time::sleep(IDLE_PASS) => {}
                    }
                }
            }
        }
        debug!("Render loop stopped");
        Ok(())
    }

    pub fn spawn(self) -> RenderLoopHandle
    where
        S: Send + 'static,
        P: Send + 'static,
    {
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(self.run(stopped));
        RenderLoopHandle { stop, task }
    }
}

pub struct RenderLoopHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl RenderLoopHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn stop(self) -> anyhow::Result<()> {
        self.stop.send_replace(true);
        self.task.await?
    }
}
