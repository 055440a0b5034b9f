//! Load command implementation

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use optusb_core::{Bootcable, ProgramImage, Progress, Step, Transport};

/// Progress reporter using an indicatif spinner
///
/// The spinner draws to stderr and stays hidden when stderr is not a
/// terminal.
struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Progress for SpinnerProgress {
    fn negotiating(&mut self, step: Step) {
        self.bar.set_message(format!("Negotiating: {}", step));
    }

    fn negotiated(&mut self) {
        self.bar.set_message("Bootcable ready");
    }

    fn sending(&mut self, total_bytes: usize) {
        self.bar
            .set_message(format!("Sending {} bytes", total_bytes));
    }

    fn sent(&mut self) {
        self.bar.set_message("Transfer complete");
    }
}

/// Negotiate with the cable behind `transport` and send the image
///
/// The transport is dropped, and the device released, before returning on
/// every path.
pub fn run_load<T: Transport>(transport: T, image: &ProgramImage) -> optusb_core::Result<()> {
    let mut progress = SpinnerProgress::new();
    let mut cable = Bootcable::new(transport);

    let result = cable.load_with(image, &mut progress);
    progress.finish();
    result
}
