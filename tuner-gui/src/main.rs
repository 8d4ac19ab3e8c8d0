//! # Choir Tuner - Acoustic Guitar Tuner GUI
//!
//! Front end for the tuner core: a note readout, a cent meter, the six
//! reference strings of standard tuning, and a Start/Stop button.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Capture Thread**: Owned by the core's cpal backend, only frames audio
//! - **Updates**: While listening, a 60 FPS tick drains new frames and estimates them

mod ui;

use iced::{Element, Subscription, Theme};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tuner_core::{CpalBackend, Tuner, TunerConfig, TuningReading, config::DEFAULT_CONFIG_FILE};
use ui::main_display::create_main_view;

/// Interval between analysis ticks (~60 FPS).
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Main entry point for the tuner application.
pub fn main() -> iced::Result {
    init_logging();
    info!("[MAIN] Starting Choir Tuner...");
    let result = iced::application("Choir Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .run();
    info!("[MAIN] Application finished with result: {:?}", result);
    result
}

/// Installs the tracing subscriber. `RUST_LOG` overrides the default level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    /// Start or stop listening, depending on the current state
    ToggleListening,
    /// Timer tick for real-time updates
    Tick,
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub listening: bool,
    pub reading: Option<TuningReading>,
    pub error: Option<String>,
    pub in_tune_cents: i32,
}

/// Main application state.
struct TunerApp {
    tuner: Tuner<CpalBackend>,
}

impl Default for TunerApp {
    fn default() -> Self {
        let config = TunerConfig::load_or_default(DEFAULT_CONFIG_FILE);
        info!(
            "[MAIN] Frame size {}, preferred rate {} Hz, correlation {:?}",
            config.frame_size, config.preferred_sample_rate, config.correlation
        );
        Self {
            tuner: Tuner::new(CpalBackend, config),
        }
    }
}

impl TunerApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::ToggleListening => {
                if self.tuner.is_listening() {
                    info!("[MAIN] Stop requested");
                    if let Err(e) = self.tuner.stop() {
                        warn!("[MAIN] Tuner stopped with an error: {e}");
                    }
                } else {
                    info!("[MAIN] Start requested");
                    // The tuner keeps the error for the view to show.
                    if let Err(e) = self.tuner.start() {
                        error!("[MAIN] Microphone unavailable: {e}");
                    }
                }
            }
            Message::Tick => {
                self.tuner.tick();
            }
        }
    }

    fn display_data(&self) -> AppDisplayData {
        AppDisplayData {
            listening: self.tuner.is_listening(),
            reading: self.tuner.reading(),
            error: self.tuner.last_error().map(|e| e.to_string()),
            in_tune_cents: self.tuner.config().in_tune_cents,
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data())
    }

    /// Ticks only while a capture session is open.
    fn subscription(&self) -> Subscription<Message> {
        if self.tuner.is_listening() {
            iced::time::every(TICK_INTERVAL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
