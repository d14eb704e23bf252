//! Renders [`CompileError`] and [`CompilerWarning`] to stderr/stdout.
//!
//! Colour escapes are only ever emitted when standard output is attached to a
//! terminal (spec §6); piped or redirected output gets plain text so logs and
//! test fixtures stay diff-friendly.

use super::errors::{CompileError, CompilerMessages};
use super::warnings::CompilerWarning;
use saying::say;
use std::io::IsTerminal;

fn colour_enabled() -> bool {
    std::io::stdout().is_terminal()
}

pub fn print_error(err: &CompileError) {
    if colour_enabled() {
        say!(Red { err.kind.label() }, ": ", { err.msg.clone() });
        say!(Grey "\n --> ", { err.loc.to_string() });
    } else {
        eprintln!("{}: {}\n --> {}", err.kind.label(), err.msg, err.loc);
    }
}

pub fn print_warning(warning: &CompilerWarning) {
    if colour_enabled() {
        say!(Yellow "warning: ", { warning.msg.clone() });
        say!(Grey "\n --> ", { warning.loc.to_string() });
    } else {
        eprintln!("warning: {}\n --> {}", warning.msg, warning.loc);
    }
}

/// Prints every warning then every error (there is at most one, since
/// compilation aborts on the first fatal diagnostic, but the aggregate shape
/// matches the teacher's `CompilerMessages { errors, warnings }` split) and
/// reports whether anything fatal was printed.
pub fn print_compiler_messages(messages: &CompilerMessages) -> bool {
    for warning in &messages.warnings {
        print_warning(warning);
    }
    for error in &messages.errors {
        print_error(error);
    }
    messages.has_errors()
}
