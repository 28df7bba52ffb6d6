use color_eyre::{eyre::eyre, Result};
use dalek_remote::config::RemoteConfig;
use dalek_remote::gamepad::GamepadHandle;
use dalek_remote::session::SessionRunner;
use dalek_remote::ui::DalekRemoteUI;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config().await?;

    // Erstes Argument überschreibt den Host aus der Konfiguration
    let host_override = std::env::args().nth(1);
    let endpoint = config.endpoint_url(host_override.as_deref());
    info!("Controlling the Dalek at {}", endpoint);

    let (session, session_task) = SessionRunner::spawn(endpoint.clone(), config.session_settings());
    if config.logging.verbose {
        session.toggle_verbose();
    }

    let shutdown = CancellationToken::new();
    let (_gamepad_handle, gamepad_events) = if config.gamepad.enabled {
        match GamepadHandle::spawn(config.gamepad.deadzone, shutdown.child_token()) {
            Ok((handle, events)) => (Some(handle), Some(events)),
            Err(e) => {
                warn!("Continuing without gamepad: {}", e);
                (None, None)
            }
        }
    } else {
        info!("Gamepad disabled in configuration");
        (None, None)
    };

    info!("Starting panel");
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_title("Dalek Remote")
        .with_inner_size([900.0, 560.0])
        .with_fullscreen(config.ui.fullscreen);

    let ui_session = session.clone();
    let run_result = eframe::run_native(
        "Dalek Remote",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(DalekRemoteUI::new(
                cc,
                ui_session,
                gamepad_events,
                &config,
                endpoint,
            )))
        }),
    );

    info!("Panel closed, shutting down");
    shutdown.cancel();
    session.shutdown();
    if let Err(e) = session_task.await {
        warn!("Session task ended abnormally: {}", e);
    }

    run_result.map_err(|e| eyre!("Panel failed: {}", e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn load_config() -> Result<RemoteConfig> {
    let path = RemoteConfig::default_path();
    RemoteConfig::ensure_default_config(&path)
        .await
        .map_err(|e| eyre!("Failed to prepare configuration: {}", e))?;
    RemoteConfig::load(&path)
        .await
        .map_err(|e| eyre!("Failed to load configuration: {}", e))
}
