use clap::Parser;
use face_overlay::config::AppConfig;
use face_overlay::geometry::OverlayKind;
use face_overlay::shell::UiShell;
use face_overlay::source::{CameraSource, ZenohArgs, ZenohFrameSource};
use log::info;
use std::path::PathBuf;

const WINDOW: &str = "face overlay";

#[derive(Parser, Debug)]
#[command(about = "Camera filters that follow your face")]
struct Args {
    /// JSON configuration file.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Camera device index.
    #[clap(long)]
    camera: Option<i32>,

    /// Image used by the custom filter.
    #[clap(long)]
    custom_image: Option<PathBuf>,

    /// Initial filter: hat, glasses, mustache, custom, mask, logo or none.
    #[clap(long)]
    filter: Option<OverlayKind>,

    /// Show the camera as it sees you instead of as a mirror.
    #[clap(long)]
    no_mirror: bool,

    /// Read frames published by camera-driver instead of a local camera.
    #[clap(long)]
    remote: bool,

    /// Key expression camera-driver publishes on.
    #[clap(long)]
    topic: Option<String>,

    #[clap(flatten)]
    zenoh: ZenohArgs,
}

impl Args {
    fn app_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(camera) = self.camera {
            config.camera = camera;
        }
        if let Some(path) = &self.custom_image {
            config.custom_image = Some(path.clone());
        }
        if let Some(filter) = self.filter {
            config.filter = filter;
        }
        if self.no_mirror {
            config.mirror = false;
        }
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        Ok(config)
    }

    fn remote(&self) -> bool {
        self.remote || !self.zenoh.is_empty()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.app_config()?;

    let shell = UiShell::new(WINDOW, config.clone())?;
    if args.remote() {
        info!("Using remote camera on {}", config.topic);
        let source = ZenohFrameSource::subscribe(args.zenoh.config(), &config.topic).await?;
        shell.run(source).await
    } else {
        let source = CameraSource::new(config.camera)?;
        shell.run(source).await
    }
}
