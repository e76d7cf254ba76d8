// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

/// Where a console is in its prompt / command cycle.
///
/// ```text
///            display_prompt()
///   Needed ─────────────────────▶ Prompted
///     ▲  ◀─────────────────────     │
///     │   complete line handed      │
///     │   off for execution         │
///     │                             │
///     │ enable_console_input()      │ disable_console_input()
///     │                             ▼  (from any state)
///     └──────────────────────── Blocked
/// ```
///
/// While [`Blocked`], a foreground operation owns the console: its input descriptor is
/// not monitored and no prompt is shown.
///
/// [`Blocked`]: PromptState::Blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptState {
    #[default]
    Blocked,
    Needed,
    Prompted,
}
