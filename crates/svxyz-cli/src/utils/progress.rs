use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svxyz::engine::progress::{Progress, ProgressCallback};
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

#[derive(Default)]
struct Counts {
    processed: u64,
    kept: u64,
}

#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
    counts: Arc<Mutex<Counts>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner()
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.disable_steady_tick();
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
            counts: Arc::new(Mutex::new(Counts::default())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();
        let counts_clone = self.counts.clone();

        Box::new(move |progress: Progress| {
            let (Ok(pb_guard), Ok(mut counts)) = (pb_clone.lock(), counts_clone.lock()) else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::SourceStart { path } => {
                    *counts = Counts::default();
                    pb_guard.reset();
                    pb_guard.set_style(Self::spinner_style());
                    pb_guard.set_prefix(
                        path.file_name()
                            .map_or_else(|| path.display().to_string(), |n| {
                                n.to_string_lossy().into_owned()
                            }),
                    );
                    pb_guard.set_message("starting");
                    pb_guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::FrameProcessed { kept } => {
                    counts.processed += 1;
                    if kept {
                        counts.kept += 1;
                    }
                    pb_guard.set_position(counts.processed);
                    pb_guard.set_message(format!("{} kept", counts.kept));
                }
                Progress::SourceFinish => {
                    pb_guard.disable_steady_tick();
                    pb_guard.finish_with_message(format!(
                        "{} of {} frame(s) kept ✓",
                        counts.kept, counts.processed
                    ));
                }
                Progress::Message(msg) => {
                    if !pb_guard.is_finished() {
                        pb_guard.println(format!("  {}", msg));
                    } else {
                        pb_guard.set_message(msg);
                    }
                }
            }
        })
    }

    /// Clears a spinner left running by a failed run.
    pub fn finish(&self) {
        if let Ok(pb) = self.pb.lock() {
            if !pb.is_finished() {
                pb.disable_steady_tick();
                pb.abandon();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {pos} frames ({msg})")
            .expect("Failed to create spinner style template")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::new();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.position(), 0);
        assert!(pb.is_finished());
    }

    #[test]
    fn callback_tracks_frames_per_source() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::SourceStart {
            path: PathBuf::from("runs/a.xyz"),
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert!(!pb.is_finished());
            assert_eq!(pb.prefix(), "a.xyz");
        }

        callback(Progress::FrameProcessed { kept: true });
        callback(Progress::FrameProcessed { kept: false });
        callback(Progress::FrameProcessed { kept: true });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.position(), 3);
            assert_eq!(pb.message(), "2 kept");
        }

        callback(Progress::SourceFinish);
        {
            let pb = handler.pb.lock().unwrap();
            assert!(pb.is_finished());
            assert!(pb.message().starts_with("2 of 3"));
        }

        callback(Progress::SourceStart {
            path: PathBuf::from("b.xyz"),
        });
        callback(Progress::FrameProcessed { kept: false });
        assert_eq!(handler.pb.lock().unwrap().message(), "0 kept");
        handler.finish();
        assert!(handler.pb.lock().unwrap().is_finished());
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        std::thread::spawn(move || {
            callback(Progress::SourceStart {
                path: PathBuf::from("thread.xyz"),
            });
            callback(Progress::FrameProcessed { kept: true });
            callback(Progress::SourceFinish);
        })
        .join()
        .unwrap();

        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "1 of 1 frame(s) kept ✓");
    }

    #[test]
    fn message_after_finish_replaces_the_status_line() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::Message("hello".into()));
        assert_eq!(handler.pb.lock().unwrap().message(), "hello");
    }
}
