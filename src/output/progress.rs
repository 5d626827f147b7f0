use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Status line shown on stderr while the trace waits for the pipeline.
///
/// Hidden when stderr is not a terminal, so piped output only carries the
/// timeline itself.
pub struct WaitSpinner {
    pb: ProgressBar,
}

impl WaitSpinner {
    pub fn new(attended: bool) -> Self {
        let pb = if attended {
            create_spinner()
        } else {
            ProgressBar::hidden()
        };
        Self { pb }
    }

    pub fn set_message(&self, message: String) {
        self.pb.set_message(message);
    }

    /// Runs `print` with the spinner cleared from the terminal.
    pub fn suspend<F: FnOnce()>(&self, print: F) {
        self.pb.suspend(print);
    }

    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
