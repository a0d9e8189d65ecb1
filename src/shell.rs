//! HighGUI window: trackbars and keys drive the render settings, the render
//! loop's frames are shown with a status line and watermark.
//!
//! Everything here runs on the thread driving the current thread runtime,
//! which is also the thread HighGUI was initialized on.

use crate::canvas::{Canvas, Watermark};
use crate::config::AppConfig;
use crate::detector::{DetectorSession, YuNetDetector};
use crate::geometry::{OverlayKind, PlacementTuning, OFFSET_LIMIT, SCALE_MAX, SCALE_MIN};
use crate::overlay::{OverlayLibrary, OverlaySource};
use crate::render_loop::{Presenter, RenderLoop, RenderSettings};
use crate::source::FrameSource;
use log::{debug, info, warn};
use opencv::core::{self, Mat, Point, Scalar};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const TICK: Duration = Duration::from_millis(16);
/// Ticks without a rendered frame before the status placeholder is shown.
const PLACEHOLDER_AFTER: u32 = 30;
const KEY_ESC: i32 = 27;

const TRACKBAR_FILTER: &str = "Filter";
const TRACKBAR_SCALE: &str = "Scale %";
const TRACKBAR_X: &str = "X offset";
const TRACKBAR_Y: &str = "Y offset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    ToggleFullscreen,
    Upload,
    Select(OverlayKind),
}

fn command_for_key(key: i32) -> Option<Command> {
    if key < 0 {
        return None;
    }
    match key & 0xff {
        KEY_ESC => Some(Command::Quit),
        code => match char::from(code as u8) {
            'q' | 'Q' => Some(Command::Quit),
            'f' | 'F' => Some(Command::ToggleFullscreen),
            'u' | 'U' => Some(Command::Upload),
            digit @ '1'..='7' => {
                OverlayKind::from_index(digit as usize - '1' as usize).map(Command::Select)
            }
            _ => None,
        },
    }
}

fn offset_position(offset: f32) -> i32 {
    (offset + OFFSET_LIMIT).round() as i32
}

fn tuning_from_positions(scale: i32, x: i32, y: i32) -> PlacementTuning {
    PlacementTuning::new(
        scale as f32 / 100.0,
        x as f32 - OFFSET_LIMIT,
        y as f32 - OFFSET_LIMIT,
    )
}

fn positions_from_tuning(tuning: &PlacementTuning) -> (i32, i32, i32) {
    (
        (tuning.scale * 100.0).round() as i32,
        offset_position(tuning.x_offset),
        offset_position(tuning.y_offset),
    )
}

fn fullscreen_hint(fullscreen: bool) -> &'static str {
    if fullscreen {
        "f: exit fullscreen"
    } else {
        "f: fullscreen"
    }
}

fn draw_hud(frame: &mut Mat, text: &str) -> opencv::Result<()> {
    let origin = Point::new(12, 28);
    // dark outline keeps the text readable on bright frames
    for (color, thickness) in [(Scalar::all(0.0), 4), (Scalar::all(255.0), 1)] {
        imgproc::put_text(
            frame,
            text,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.55,
            color,
            thickness,
            imgproc::LINE_AA,
            false,
        )?;
    }
    Ok(())
}

/// Shows composited frames in the shell's window.
pub struct WindowPresenter {
    window: String,
    watermark: Option<Watermark>,
    hud: watch::Receiver<String>,
    frames_shown: Arc<AtomicU64>,
}

impl Presenter for WindowPresenter {
    fn present(&mut self, frame: &Mat, canvas: &Canvas) -> anyhow::Result<()> {
        let mut output = canvas.composite_onto(frame)?;
        if let Some(watermark) = &self.watermark {
            watermark.apply(&mut output)?;
        }
        draw_hud(&mut output, &self.hud.borrow())?;
        highgui::imshow(&self.window, &output)?;
        self.frames_shown.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub struct UiShell {
    window: String,
    config: AppConfig,
    session: DetectorSession,
    library: OverlayLibrary,
    kind: OverlayKind,
    tuning: PlacementTuning,
    fullscreen: bool,
    settings: watch::Sender<RenderSettings>,
    hud: watch::Sender<String>,
    uploads_tx: mpsc::UnboundedSender<Option<PathBuf>>,
    uploads: mpsc::UnboundedReceiver<Option<PathBuf>>,
    upload_pending: bool,
    frames_shown: Arc<AtomicU64>,
}

impl UiShell {
    pub fn new(window: &str, config: AppConfig) -> anyhow::Result<Self> {
        highgui::named_window(window, highgui::WINDOW_NORMAL)?;

        let mut library = OverlayLibrary::load_defaults(config.logo.as_deref());
        if let Some(path) = &config.custom_image {
            library.set_custom(&OverlaySource::File(path.clone()));
        }

        let kind = config.filter;
        let tuning = config.tuning.clamped();
        let (settings, _) = watch::channel(RenderSettings {
            kind,
            image: library.image(kind),
            tuning,
        });
        let (hud, _) = watch::channel(String::new());
        let (uploads_tx, uploads) = mpsc::unbounded_channel();

        let shell = Self {
            window: window.to_string(),
            session: DetectorSession::shared().clone(),
            library,
            kind,
            tuning,
            fullscreen: false,
            settings,
            hud,
            uploads_tx,
            uploads,
            upload_pending: false,
            frames_shown: Arc::new(AtomicU64::new(0)),
            config,
        };
        shell.create_trackbars()?;
        Ok(shell)
    }

    fn create_trackbars(&self) -> anyhow::Result<()> {
        let window = self.window.as_str();
        let offset_max = offset_position(OFFSET_LIMIT);
        let filter_max = OverlayKind::ALL.len() as i32 - 1;
        highgui::create_trackbar(TRACKBAR_FILTER, window, None, filter_max, None)?;
        highgui::create_trackbar(
            TRACKBAR_SCALE,
            window,
            None,
            (SCALE_MAX * 100.0).round() as i32,
            None,
        )?;
        highgui::set_trackbar_min(TRACKBAR_SCALE, window, (SCALE_MIN * 100.0).round() as i32)?;
        highgui::create_trackbar(TRACKBAR_X, window, None, offset_max, None)?;
        highgui::create_trackbar(TRACKBAR_Y, window, None, offset_max, None)?;
        self.write_trackbars()
    }

    fn write_trackbars(&self) -> anyhow::Result<()> {
        let window = self.window.as_str();
        let (scale, x, y) = positions_from_tuning(&self.tuning);
        highgui::set_trackbar_pos(TRACKBAR_FILTER, window, self.kind.index() as i32)?;
        highgui::set_trackbar_pos(TRACKBAR_SCALE, window, scale)?;
        highgui::set_trackbar_pos(TRACKBAR_X, window, x)?;
        highgui::set_trackbar_pos(TRACKBAR_Y, window, y)?;
        Ok(())
    }

    fn read_trackbars(&mut self) -> anyhow::Result<()> {
        let window = self.window.as_str();
        let filter = highgui::get_trackbar_pos(TRACKBAR_FILTER, window)?;
        let tuning = tuning_from_positions(
            highgui::get_trackbar_pos(TRACKBAR_SCALE, window)?,
            highgui::get_trackbar_pos(TRACKBAR_X, window)?,
            highgui::get_trackbar_pos(TRACKBAR_Y, window)?,
        );
        let kind = OverlayKind::from_index(filter.max(0) as usize).unwrap_or(self.kind);
        if kind != self.kind || tuning != self.tuning {
            self.kind = kind;
            self.tuning = tuning;
            self.publish_settings();
        }
        Ok(())
    }

    fn publish_settings(&self) {
        debug!("Settings: {} {:?}", self.kind, self.tuning);
        self.settings.send_replace(RenderSettings {
            kind: self.kind,
            image: self.library.image(self.kind),
            tuning: self.tuning,
        });
    }

    /// Returns false when the shell should quit.
    fn handle_key(&mut self, key: i32) -> anyhow::Result<bool> {
        match command_for_key(key) {
            None => {}
            Some(Command::Quit) => return Ok(false),
            Some(Command::ToggleFullscreen) => {
                let mode = if self.fullscreen {
                    highgui::WINDOW_NORMAL
                } else {
                    highgui::WINDOW_FULLSCREEN
                };
                highgui::set_window_property(
                    &self.window,
                    highgui::WND_PROP_FULLSCREEN,
                    mode as f64,
                )?;
            }
            Some(Command::Upload) => self.request_upload(),
            Some(Command::Select(kind)) => {
                self.kind = kind;
                self.write_trackbars()?;
                self.publish_settings();
            }
        }
        Ok(true)
    }

    fn request_upload(&mut self) {
        if self.kind != OverlayKind::Custom {
            info!("Select the custom filter to upload an image");
            return;
        }
        if self.upload_pending {
            return;
        }
        self.upload_pending = true;
        let uploads = self.uploads_tx.clone();
        tokio::spawn(async move {
            let picked = rfd::AsyncFileDialog::new()
                .set_title("Select overlay image")
                .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp", "svg"])
                .pick_file()
                .await
                .map(|handle| handle.path().to_path_buf());
            let _ = uploads.send(picked);
        });
    }

    fn receive_uploads(&mut self) {
        while let Ok(picked) = self.uploads.try_recv() {
            self.upload_pending = false;
            let Some(path) = picked else {
                continue;
            };
            info!("Loading custom overlay from {}", path.display());
            self.library.set_custom(&OverlaySource::File(path));
            self.publish_settings();
        }
    }

    fn sync_fullscreen(&mut self) -> anyhow::Result<()> {
        let mode = highgui::get_window_property(&self.window, highgui::WND_PROP_FULLSCREEN)?;
        self.fullscreen = mode == highgui::WINDOW_FULLSCREEN as f64;
        Ok(())
    }

    fn window_closed(&self) -> anyhow::Result<bool> {
        Ok(highgui::get_window_property(&self.window, highgui::WND_PROP_VISIBLE)? < 1.0)
    }

    fn status_line(&self) -> String {
        let mut status = format!(
            "{} | {} | scale {:.2} | x {:+.0} y {:+.0} | {}",
            self.session.state(),
            self.kind,
            self.tuning.scale,
            self.tuning.x_offset,
            self.tuning.y_offset,
            fullscreen_hint(self.fullscreen),
        );
        if self.kind == OverlayKind::Custom {
            if self.library.image(OverlayKind::Custom).is_none() {
                status.push_str(" | no image");
            }
            status.push_str(" | u: upload");
        }
        status
    }

    fn show_placeholder(&self) -> anyhow::Result<()> {
        let mut frame = Mat::new_rows_cols_with_default(480, 640, core::CV_8UC3, Scalar::all(0.0))?;
        draw_hud(&mut frame, &self.status_line())?;
        highgui::imshow(&self.window, &frame)?;
        Ok(())
    }

    fn start_detector(&self) {
        let session = self.session.clone();
        let detector = self.config.detector.clone();
        tokio::spawn(async move {
            if let Err(e) = session
                .ensure_ready(move || YuNetDetector::create(detector))
                .await
            {
                warn!("Face detector unavailable: {}", e);
            }
        });
    }

    /// Drive the window until the user quits or the render loop fails.
    pub async fn run<S>(mut self, source: S) -> anyhow::Result<()>
    where
        S: FrameSource + Send + 'static,
    {
        self.start_detector();

        let watermark = self
            .library
            .image(OverlayKind::Logo)
            .map(|logo| Watermark::new((*logo).clone()));
        let presenter = WindowPresenter {
            window: self.window.clone(),
            watermark,
            hud: self.hud.subscribe(),
            frames_shown: self.frames_shown.clone(),
        };
        let render_loop = RenderLoop::new(
            self.session.clone(),
            source,
            presenter,
            self.settings.subscribe(),
            self.config.mirror,
        )
        .spawn();

        let mut ticker = tokio::time::interval(TICK);
        let mut last_shown = 0;
        let mut idle_ticks = 0;
        loop {
            ticker.tick().await;
            if render_loop.is_finished() {
                break;
            }

            let key = highgui::poll_key()?;
            if !self.handle_key(key)? || self.window_closed()? {
                info!("Closing window");
                break;
            }
            self.read_trackbars()?;
            self.sync_fullscreen()?;
            self.receive_uploads();
            self.hud.send_replace(self.status_line());

            let shown = self.frames_shown.load(Ordering::Relaxed);
            if shown == last_shown {
                idle_ticks += 1;
                if idle_ticks >= PLACEHOLDER_AFTER {
                    self.show_placeholder()?;
                }
            } else {
                last_shown = shown;
                idle_ticks = 0;
            }
        }

        let stopped = render_loop.stop().await;
        highgui::destroy_all_windows()?;
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-1, None)]
    #[case('q' as i32, Some(Command::Quit))]
    #[case(KEY_ESC, Some(Command::Quit))]
    #[case('f' as i32, Some(Command::ToggleFullscreen))]
    #[case('u' as i32, Some(Command::Upload))]
    #[case('1' as i32, Some(Command::Select(OverlayKind::Hat)))]
    #[case('4' as i32, Some(Command::Select(OverlayKind::Custom)))]
    #[case('7' as i32, Some(Command::Select(OverlayKind::None)))]
    #[case('8' as i32, None)]
    #[case(0x10_0000 | 'f' as i32, Some(Command::ToggleFullscreen))]
    fn keys_map_to_commands(#[case] key: i32, #[case] command: Option<Command>) {
        assert_eq!(command_for_key(key), command);
    }

    #[test]
    fn trackbar_positions_map_to_tuning() {
        let tuning = tuning_from_positions(125, 200, 180);
        assert_eq!(tuning, PlacementTuning::new(1.25, 0.0, -20.0));
        assert_eq!(positions_from_tuning(&tuning), (125, 200, 180));

        let extremes = tuning_from_positions(60, 0, 400);
        assert_eq!(extremes, PlacementTuning::new(0.6, -200.0, 200.0));
        assert_eq!(positions_from_tuning(&extremes), (60, 0, 400));
    }

    #[test]
    fn default_tuning_sits_on_trackbar_positions() {
        let (scale, x, y) = positions_from_tuning(&PlacementTuning::default());
        assert_eq!(tuning_from_positions(scale, x, y), PlacementTuning::default());
    }

    #[test]
    fn fullscreen_hint_follows_state() {
        assert_eq!(fullscreen_hint(false), "f: fullscreen");
        assert_eq!(fullscreen_hint(true), "f: exit fullscreen");
    }

    #[test]
    fn hud_draws_on_the_frame() {
        let mut frame =
            Mat::new_rows_cols_with_default(60, 400, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        draw_hud(&mut frame, "ready | hat").unwrap();
        assert!(frame.data_bytes().unwrap().iter().any(|value| *value > 0));
    }
}
