use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use slidecube_core::pipeline::ProgressReporter;

/// Drives one indicatif bar per pipeline stage.
pub struct BarReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, name: &str, total_items: Option<usize>) {
        let bar = match total_items {
            Some(total) => ProgressBar::new(total as u64),
            None => ProgressBar::new_spinner(),
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {pos}/{len}")
                .expect("progress template is valid")
                .progress_chars("=> "),
        );
        bar.set_message(name.to_string());
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn advance(&self) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.inc(1);
        }
    }

    fn finish_stage(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish();
        }
    }
}
