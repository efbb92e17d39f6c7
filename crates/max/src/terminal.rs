//! A [`ChatView`] for the terminal.

use std::io::{self, Write as _};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::chat::{ChatHistory, ChatView, ERROR_MARK, Phase, Role};

const BAR_CHAR: &str = "▎";

/// Prints responses as they stream in, with a spinner while Max is
/// thinking or using tools.
///
/// The user's own messages are not printed again, the terminal already
/// echoed them.
pub struct TerminalView {
    spinner: Option<ProgressBar>,
    spinner_style: ProgressStyle,
    // What of the current response has been printed.
    shown: String,
    in_response: bool,
}

impl TerminalView {
    /// Creates a new terminal view.
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Self {
            spinner: None,
            spinner_style,
            shown: String::new(),
            in_response: false,
        }
    }

    fn show_spinner(&mut self, message: &str) {
        let spinner = self.spinner.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(self.spinner_style.clone());
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });
        spinner.set_message(message.to_owned());
    }

    fn hide_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn print_response(&mut self, text: &str, done: bool) {
        let mut stdout = io::stdout().lock();
        if !self.in_response {
            write!(stdout, "{}🤖 ", BAR_CHAR.bright_cyan()).ok();
            self.in_response = true;
        }

        // A response that was replaced, e.g. by an error message, starts
        // over on a new line.
        let fresh = match text.strip_prefix(self.shown.as_str()) {
            Some(rest) => rest,
            None => {
                writeln!(stdout).ok();
                text
            }
        };
        if text.starts_with(ERROR_MARK) {
            write!(stdout, "{}", fresh.bright_red()).ok();
        } else {
            write!(stdout, "{}", fresh.bright_white()).ok();
        }
        self.shown.clear();
        self.shown.push_str(text);

        if done {
            writeln!(stdout, "\n").ok();
            self.shown.clear();
            self.in_response = false;
        }
        stdout.flush().ok();
    }
}

impl Default for TerminalView {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView for TerminalView {
    fn redraw(&mut self, history: &ChatHistory, phase: Phase) {
        let Some((role, text)) = history.last() else {
            return;
        };
        if *role == Role::User {
            return;
        }
        match phase {
            Phase::Waiting => self.show_spinner(text),
            Phase::Streaming => {
                self.hide_spinner();
                self.print_response(text, false);
            }
            Phase::Done => {
                self.hide_spinner();
                self.print_response(text, true);
            }
        }
    }

    fn cleared(&mut self) {
        self.hide_spinner();
        println!("{}\n", "Chat cleared".dimmed());
    }
}
