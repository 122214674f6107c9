use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Progress {
    SourceStart { path: PathBuf },
    SourceFinish,

    FrameProcessed { kept: bool },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::Message("nobody listens".into()));
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::FrameProcessed { kept } = event {
                seen.lock().unwrap().push(kept);
            }
        }));

        reporter.report(Progress::FrameProcessed { kept: true });
        reporter.report(Progress::SourceFinish);
        reporter.report(Progress::FrameProcessed { kept: false });
        drop(reporter);

        assert_eq!(seen.into_inner().unwrap(), vec![true, false]);
    }
}
