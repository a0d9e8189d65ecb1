use clap::Parser;
use face_overlay::config::DEFAULT_TOPIC;
use face_overlay::source::{mat_to_jpeg, CameraSource, ZenohArgs};
use face_overlay::ErrorWrapper;
use log::{debug, info};
use opencv::highgui;
use std::time::Duration;
use zenoh::prelude::r#async::*;

#[derive(Parser, Debug)]
#[command(about = "Publish camera frames as JPEG over zenoh")]
struct Args {
    /// Camera device index.
    #[clap(long, default_value_t = 0)]
    camera: i32,

    /// Key expression to publish on.
    #[clap(long, default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Show the captured frames in a window.
    #[clap(long)]
    preview: bool,

    #[clap(flatten)]
    zenoh: ZenohArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();

    let zenoh_session = zenoh::open(args.zenoh.config())
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;
    let zenoh_session = zenoh_session.into_arc();

    let publisher = zenoh_session
        .declare_publisher(args.topic.clone())
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;
    info!("Publishing frames on {}", args.topic);

    let mut camera = CameraSource::new(args.camera)?;
    if args.preview {
        highgui::named_window_def("camera")?;
    }

    let mut published: u64 = 0;
    loop {
        let Some(frame) = camera.read()? else {
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        };
        if args.preview {
            highgui::imshow("camera", &frame)?;
            _ = highgui::poll_key()?;
        }

        let data = mat_to_jpeg(&frame)?;
        publisher
            .put(data)
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;

        published += 1;
        if published % 300 == 0 {
            debug!("Published {} frames", published);
        }
    }
}
