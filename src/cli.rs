use console::{style, Term};
use std::sync::atomic::{AtomicBool, Ordering};

/// Width of the message prefix column
const PREFIX_LEN: usize = 10;

/// Whether debug!() messages should be printed
pub static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Right-align a (styled) prefix into the prefix column
pub fn gen_prefix(prefix: &str) -> String {
    let len = console::measure_text_width(prefix);
    if len >= PREFIX_LEN {
        format!("{prefix} ")
    } else {
        format!("{}{prefix} ", " ".repeat(PREFIX_LEN - len))
    }
}

/// Print a message with the given prefix to stderr
pub fn writeln(prefix: &str, msg: &str) {
    let term = Term::stderr();
    // Nothing sensible to do if stderr is gone
    let _ = term.write_line(&format!("{}{msg}", gen_prefix(prefix)));
}

pub fn styled_prefix(kind: &str) -> String {
    match kind {
        "DEBUG" => style(kind).dim().to_string(),
        "INFO" => style(kind).blue().bold().to_string(),
        "WARNING" => style(kind).yellow().bold().to_string(),
        "ERROR" => style(kind).red().bold().to_string(),
        "SUCCESS" => style(kind).green().bold().to_string(),
        "DUE TO" => style(kind).yellow().to_string(),
        _ => kind.to_string(),
    }
}

#[macro_export]
macro_rules! msg {
    ($prefix:expr, $($arg:tt)+) => {{
        $crate::cli::writeln($prefix, &format!($($arg)+));
    }};
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {{
        if $crate::cli::is_verbose() {
            $crate::cli::writeln(&$crate::cli::styled_prefix("DEBUG"), &format!($($arg)+));
        }
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {{
        $crate::cli::writeln(&$crate::cli::styled_prefix("INFO"), &format!($($arg)+));
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {{
        $crate::cli::writeln(&$crate::cli::styled_prefix("WARNING"), &format!($($arg)+));
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {{
        $crate::cli::writeln(&$crate::cli::styled_prefix("ERROR"), &format!($($arg)+));
    }};
}

#[macro_export]
macro_rules! due_to {
    ($($arg:tt)+) => {{
        $crate::cli::writeln(&$crate::cli::styled_prefix("DUE TO"), &format!($($arg)+));
    }};
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)+) => {{
        $crate::cli::writeln(&$crate::cli::styled_prefix("SUCCESS"), &format!($($arg)+));
    }};
}
