//! Shared CLI presentation utilities.
//!
//! Format-only: turns command results into terminal text.

use gwsh_core::CommandOutput;

/// Output text without the trailing ready-prompt.
pub fn strip_prompt<'a>(text: &'a str, prompt: &str) -> &'a str {
    text.strip_suffix(prompt).unwrap_or(text)
}

/// Terminal rendering of one command result.
///
/// Completed output loses its trailing prompt; timed-out output keeps the
/// warning line.
pub fn render_output(output: &CommandOutput, prompt: &str) -> String {
    if output.timed_out {
        return output.to_string();
    }
    strip_prompt(&output.output, prompt).to_string()
}

/// Print text, adding a newline only when it does not end with one.
pub fn print_block(text: &str) {
    if text.is_empty() {
        return;
    }
    if text.ends_with('\n') {
        print!("{text}");
    } else {
        println!("{text}");
    }
}
