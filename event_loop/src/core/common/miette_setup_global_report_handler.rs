// Copyright (c) 2024-2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Installs the graphical [`miette`] report hook that binaries built on this crate use
//! to print errors that escape `main()`.
//!
//! The hook is lazy. It only runs when a report is displayed, so nothing is computed if
//! no error ever escapes.

use miette::MietteHandlerOpts;

/// Fallback width when `COLUMNS` is not set (or not a number).
const DEFAULT_REPORT_WIDTH: usize = 80;

/// Registers a global [`miette::ErrorHook`] that renders reports graphically, with the
/// cause chain, and with `issues_url` as the footer.
///
/// Calling this more than once is harmless, later calls are ignored.
pub fn setup_default_miette_global_report_handler(issues_url: &'static str) {
    miette::set_hook(Box::new(move |_report| {
        let terminal_width = std::env::var("COLUMNS")
            .ok()
            .and_then(|it| it.parse::<usize>().ok())
            .unwrap_or(DEFAULT_REPORT_WIDTH);
        tracing::debug!(message = "miette::set_hook", terminal_width);
        Box::new(
            MietteHandlerOpts::new()
                .width(terminal_width)
                .wrap_lines(true)
                .unicode(true)
                .context_lines(3)
                .tab_width(4)
                .break_words(true)
                .with_cause_chain()
                .footer(issues_url.to_string())
                .build(),
        )
    }))
    .ok();
}
