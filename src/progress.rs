//! Terminal progress for configuration runs.

use colored::Colorize;
use declarative::ProgressCallback;

/// Prints scheduler progress for one host.
///
/// Prepared objects are only shown with `-v`; finished objects that changed
/// something are always shown unless quiet.
pub struct TerminalProgress {
    host: String,
    verbose: bool,
    quiet: bool,
}

impl TerminalProgress {
    pub fn new(host: impl Into<String>, verbose: u8, quiet: bool) -> Self {
        Self {
            host: host.into(),
            verbose: verbose > 0,
            quiet,
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_pass_start(&mut self, pass: usize) {
        if self.verbose && !self.quiet {
            println!("{} pass {pass}", format!("[{}]", self.host).blue().bold());
        }
    }

    fn on_object_prepared(&mut self, name: &str) {
        if self.verbose && !self.quiet {
            println!("{} {} {}", format!("[{}]", self.host).blue(), "prepared".dimmed(), name);
        }
    }

    fn on_object_done(&mut self, name: &str, changed: bool) {
        if self.quiet {
            return;
        }
        if changed {
            println!("{} {} {}", format!("[{}]", self.host).blue(), "✓".green(), name);
        } else if self.verbose {
            println!("{} {} {}", format!("[{}]", self.host).blue(), "·".dimmed(), name.dimmed());
        }
    }
}
