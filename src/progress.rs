//! Rotating progress indicator for the retry and wait states

use fanout_shared::defaults::PENDING_DOTS;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner ticked once per retry, e.g. `Retrying..  `
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Create a spinner showing `message` followed by rotating dots
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let frames = dot_frames(PENDING_DOTS);
        let frames: Vec<&str> = frames.iter().map(String::as_str).collect();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}{spinner}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&frames),
        );
        bar.set_message(message.to_string());

        Self { bar }
    }

    /// Advance the indicator by one frame
    pub fn tick(&self) {
        self.bar.tick();
    }

    /// Remove the indicator from the terminal
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// `count` frames of growing dots, padded to the same width, plus the
/// final frame indicatif shows once finished
fn dot_frames(count: usize) -> Vec<String> {
    let mut frames: Vec<String> = (1..=count)
        .map(|n| format!("{}{}", ".".repeat(n), " ".repeat(count - n)))
        .collect();
    frames.push(" ".repeat(count));
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_frames() {
        assert_eq!(dot_frames(4), vec![".   ", "..  ", "... ", "....", "    "]);
    }

    #[test]
    fn test_spinner_ticks_without_terminal() {
        let spinner = Spinner::new("Waiting for orders");
        spinner.tick();
        spinner.tick();
        spinner.finish_and_clear();
    }
}
