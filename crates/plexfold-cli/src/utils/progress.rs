use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use plexfold::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    base_message: String,
}

/// Renders core [`Progress`] events as indicatif spinners and band bars.
#[derive(Clone)]
pub struct CliProgressHandler {
    mp: Arc<MultiProgress>,
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        Self {
            mp: Arc::new(mp),
            state: Arc::new(Mutex::new(BarState::default())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let mp = self.mp.clone();
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned; cannot update UI.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    if let Some(bar) = state.active_bar.take() {
                        bar.finish_and_clear();
                    }

                    let pb = mp.add(ProgressBar::new_spinner());
                    pb.enable_steady_tick(Duration::from_millis(80));
                    pb.set_style(Self::spinner_style());
                    pb.set_message(name.to_string());

                    state.active_bar = Some(pb);
                    state.base_message = name.to_string();
                }
                Progress::PhaseFinish => {
                    if let Some(bar) = state.active_bar.take() {
                        bar.finish_and_clear();
                    }
                    mp.println(format!("✓ {}", state.base_message)).ok();
                    state.base_message.clear();
                }
                Progress::BandStart { size, jobs } => {
                    if let Some(bar) = state.active_bar.as_ref() {
                        bar.set_style(Self::bar_style());
                        bar.set_length(jobs.max(1));
                        bar.set_position(0);
                        bar.set_message(format!("size {}", size));
                        bar.disable_steady_tick();
                    }
                }
                Progress::BandIncrement => {
                    if let Some(bar) = state.active_bar.as_ref() {
                        bar.inc(1);
                    }
                }
                Progress::BandFinish { size, kept } => {
                    if let Some(bar) = state.active_bar.as_ref() {
                        bar.finish();
                        bar.set_style(Self::spinner_style());
                        bar.set_message(state.base_message.clone());
                        bar.enable_steady_tick(Duration::from_millis(80));
                    }
                    mp.println(format!("  size {}: kept {}", size, kept)).ok();
                }
                Progress::Message(msg) => {
                    mp.println(format!("  {}", msg)).ok();
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<12} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("Invalid template")
            .progress_chars("━╸ ")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
