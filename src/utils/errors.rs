use nu_ansi_term::{AnsiGenericString, Style};
use std::error::Error as StdError;

use crate::color::{self, MaybePaint};

pub const DEFAULT_EXIT_CODE: i32 = 1;

fn labelled(indicator: Style, label: &str, style: Style, text: &str) {
    let label: AnsiGenericString<'_, str> = indicator.maybe_paint(label);
    let text: AnsiGenericString<'_, str> = style.maybe_paint(text);

    eprintln!("{} {}", label, text);
}

pub(crate) fn error_internal(text: &str) {
    labelled(*color::ERROR_INDICATOR, "error:", *color::ERROR_TEXT, text);
}

pub(crate) fn warn_internal(text: &str) {
    labelled(*color::WARNING_INDICATOR, "warning:", *color::WARNING_TEXT, text);
}

/// Formats an error followed by its chain of sources, one per line.
pub(crate) fn with_sources(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();

    while let Some(err) = source {
        text.push_str(&format!("\n  caused by: {}", err));
        source = err.source();
    }

    text
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! report {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}
