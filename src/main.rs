use eframe::egui;
use tracing_subscriber::prelude::*;

mod app;
mod nav;
mod persist;
mod session;
mod video;

use app::FrameAnnotateApp;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,frame_annotate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("Video Frame Selector"),
        ..Default::default()
    };

    eframe::run_native(
        "Video Frame Selector",
        options,
        Box::new(|_cc| Ok(Box::new(FrameAnnotateApp::new()))),
    )
    .expect("Failed to run eframe");
}
