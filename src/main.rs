use std::process::ExitCode;

use eframe::egui;
use kidpaint::app::KidPaintApp;
use kidpaint::session::DrawingSession;
use kidpaint::settings::StudioSettings;
use kidpaint::{cli, log_err, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- Studio mode ---------------------------------------------------
    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = StudioSettings::load();
    let session = match DrawingSession::from_settings(&settings) {
        Ok(s) => s,
        Err(e) => {
            log_err!("Cannot start with saved settings: {}", e);
            eprintln!("error: {} (check {:?})", e, StudioSettings::settings_path());
            return ExitCode::FAILURE;
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_min_inner_size([480.0, 360.0])
            .with_title("KidPaint"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "KidPaint",
        options,
        Box::new(move |cc| Box::new(KidPaintApp::new(cc, session, settings))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("Studio exited with error: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
