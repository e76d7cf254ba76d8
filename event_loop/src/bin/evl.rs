// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A small line-oriented REPL on stdin, driven entirely by the event loop.
//!
//! Try typing `help`. `Ctrl+C` is handled by an async signal handler, `Ctrl+D` (end of
//! file) quits, a blank line repeats the previous command, and a line ending in `\`
//! continues on the next one.

use clap::{Parser, ValueEnum};
use r3bl_event_loop::{AsyncSignalHandlerId, EventLoop, EventLoopConfig, EventLoopResult,
                      NotifierBackendPreference, TracingConfig, Ui, UiId, is_comment,
                      setup_default_miette_global_report_handler,
                      try_initialize_logging_global};
use std::{cell::Cell, rc::Rc, time::Duration};
use tracing_core::LevelFilter;

const ISSUES_URL: &str = "https://github.com/r3bl-org/r3bl-open-core/issues/new";

/// More info: <https://docs.rs/clap/latest/clap/_derive/_tutorial/chapter_2/index.html>
#[derive(Debug, Parser)]
#[command(bin_name = "evl")]
#[command(about = "Line-oriented REPL running on a cooperative event loop")]
#[command(version)]
#[command(next_line_help = true)]
pub struct CLIArg {
    #[arg(long, short = 'p', default_value = "(evl) ", help = "Prompt to display")]
    pub prompt: String,

    #[arg(
        long,
        short = 'b',
        value_enum,
        default_value_t = Backend::Auto,
        help = "Readiness backend: mio with poll(2) fallback, or poll(2) only"
    )]
    pub backend: Backend,

    #[arg(long, short = 'l', help = "Log to this file")]
    pub log_file: Option<String>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info, help = "Log level")]
    pub log_level: LogLevel,

    #[arg(long, help = "Pass backspace and ^U through instead of editing the line")]
    pub no_command_editing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Auto,
    Poll,
}

impl From<Backend> for NotifierBackendPreference {
    fn from(it: Backend) -> Self {
        match it {
            Backend::Auto => Self::Auto,
            Backend::Poll => Self::Poll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(it: LogLevel) -> Self {
        match it {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

const HELP: &str = "\
Commands:
  echo TEXT          print TEXT
  timer MS TEXT      print TEXT after MS milliseconds, in the background
  sleep MS           block the console for MS milliseconds (foreground)
  confirm            ask a yes / no question
  fail               return an error
  help               show this text
  quit               exit
";

fn main() -> miette::Result<()> {
    let cli_arg = CLIArg::parse();
    setup_default_miette_global_report_handler(ISSUES_URL);

    if let Some(log_file) = &cli_arg.log_file {
        try_initialize_logging_global(
            TracingConfig::new_file(Some(log_file.clone()))
                .with_level_filter(cli_arg.log_level.into()),
        )?;
        // % is Display, ? is Debug.
        tracing::info!(message = "Start logging...", cli_arg = ?cli_arg);
    }

    let config = EventLoopConfig::default().with_notifier_backend(cli_arg.backend.into());
    let mut event_loop = EventLoop::with_config(config);

    let interrupt: Rc<Cell<Option<AsyncSignalHandlerId>>> = Rc::default();
    let ui = {
        let interrupt = Rc::clone(&interrupt);
        Ui::new(
            std::io::stdin(),
            std::io::stdout(),
            move |event_loop, ui, command| {
                dispatch_command(event_loop, ui, command, interrupt.get())
            },
        )
        .with_prompt(cli_arg.prompt.clone())
        .with_command_editing(!cli_arg.no_command_editing)
    };
    let ui = event_loop.add_ui(ui)?;

    let id = event_loop.install_os_signal_handler(signal_hook::consts::SIGINT, move |event_loop| {
        event_loop.write_to_console(ui, "\nQuit\n")?;
        event_loop.display_prompt(ui, None)
    })?;
    interrupt.set(Some(id));

    event_loop.display_prompt(ui, None)?;
    event_loop.start_event_loop();

    tracing::info!(message = "Stop logging...");
    Ok(())
}

fn dispatch_command(
    event_loop: &mut EventLoop,
    ui: UiId,
    command: &str,
    interrupt: Option<AsyncSignalHandlerId>,
) -> EventLoopResult<()> {
    if is_comment(command) {
        return Ok(());
    }
    let (verb, rest) = command
        .trim()
        .split_once(' ')
        .unwrap_or((command.trim(), ""));
    match verb {
        "" => Ok(()),
        "echo" => event_loop.write_to_console(ui, &format!("{rest}\n")),
        "help" => event_loop.write_to_console(ui, HELP),
        "timer" => {
            let (delay, text) = parse_delay(rest)?;
            let text = text.to_string();
            event_loop.create_timer(delay, move |event_loop| {
                event_loop.write_to_console(ui, &format!("\n{text}\n"))?;
                event_loop.display_prompt(ui, None)
            });
            Ok(())
        }
        "sleep" => {
            let (delay, _) = parse_delay(rest)?;
            event_loop.disable_console_input(ui)?;
            event_loop.create_timer(delay, move |event_loop| {
                event_loop.write_to_console(ui, "done\n")?;
                event_loop.enable_console_input(ui)?;
                event_loop.display_prompt(ui, None)
            });
            Ok(())
        }
        "confirm" => {
            let answer = event_loop.read_secondary_line(ui, "Are you sure? (y or n) ")?;
            let reply = match answer.as_deref().map(str::trim) {
                Some("y" | "yes") => "Confirmed.\n",
                _ => "Not confirmed.\n",
            };
            event_loop.write_to_console(ui, reply)
        }
        "fail" => Err(miette::miette!(
            code = "evl::fail",
            help = "This command always fails",
            "Failed on purpose"
        )),
        "quit" => {
            if let Some(id) = interrupt {
                event_loop.delete_async_signal_handler(id);
            }
            drop(event_loop.remove_ui(ui));
            Ok(())
        }
        _ => event_loop.write_to_console(
            ui,
            &format!("Undefined command: \"{verb}\".  Try \"help\".\n"),
        ),
    }
}

fn parse_delay(args: &str) -> EventLoopResult<(Duration, &str)> {
    let (millis, rest) = args.split_once(' ').unwrap_or((args, ""));
    let millis = millis
        .parse::<u64>()
        .map_err(|err| miette::miette!("Expected a delay in milliseconds: {err}"))?;
    Ok((Duration::from_millis(millis), rest))
}
