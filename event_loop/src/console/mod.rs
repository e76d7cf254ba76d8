// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod command_line;
pub mod input_bridge;
pub mod line_assembler;
pub mod prompt_state;
pub mod ui;
pub mod ui_registry;

// Re-export.
pub use command_line::*;
pub use input_bridge::*;
pub use line_assembler::*;
pub use prompt_state::*;
pub use ui::*;
pub use ui_registry::*;
