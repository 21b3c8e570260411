// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive shell driving a host object through the bridge entry points.
//!
//! Every command runs with the shell's engine bound to the thread, the way
//! a native callback frame would.

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use tether_bridge::{
    BoundaryResult, BridgeConfig, HandleTable, HostBridge, HostEngine, HostFault, HostFunction,
    HostHandle, HostValue, PropertyBag, ScriptEngine, ScriptValue, NativeString, with_engine,
};

/// Shell configuration constants
const HISTORY_FILE: &str = ".tether_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand<'a> {
    Get(&'a str),
    Set(&'a str, &'a str),
    Del(&'a str),
    Names,
    Call(&'a str, &'a str),
    Invocability(Option<&'a str>),
    Handles,
    Help,
    Clear,
    Exit,
}

impl<'a> ShellCommand<'a> {
    /// Parse a command line. Errors carry the usage line.
    pub fn parse(input: &'a str) -> Result<Self, String> {
        let input = input.trim();
        let (cmd, rest) = input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(c, r)| (c, r.trim()));
        let mut words = rest.splitn(2, char::is_whitespace);
        let first = words.next().filter(|w| !w.is_empty());
        let remainder = words.next().map(str::trim).unwrap_or("");

        let command = match cmd.trim_start_matches('.').to_lowercase().as_str() {
            "get" => ShellCommand::Get(first.ok_or("get <name>")?),
            "set" => {
                let name = first.ok_or("set <name> <value>")?;
                if remainder.is_empty() {
                    return Err("set <name> <value>".into());
                }
                ShellCommand::Set(name, remainder)
            }
            "del" | "delete" => ShellCommand::Del(first.ok_or("del <name>")?),
            "names" | "ls" => ShellCommand::Names,
            "call" => ShellCommand::Call(first.ok_or("call <name> [args...]")?, remainder),
            "invocability" | "inv" => ShellCommand::Invocability(first),
            "handles" => ShellCommand::Handles,
            "help" | "h" | "?" => ShellCommand::Help,
            "clear" | "cls" => ShellCommand::Clear,
            "exit" | "quit" | "q" => ShellCommand::Exit,
            other => return Err(format!("unknown command '{}', try help", other)),
        };
        Ok(command)
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            ("get <name>", "Read a property"),
            ("set <name> <value>", "Write a property (JSON or bare string)"),
            ("del <name>", "Delete a property"),
            ("names", "List property names"),
            ("call <name> [args...]", "Invoke a method"),
            ("invocability [name]", "Query how the object or a member may be called"),
            ("handles", "Show outstanding host handles"),
            ("help", "Show this help message"),
            ("clear", "Clear the screen"),
            ("exit", "Exit the shell"),
        ]
    }
}

/// Parse a shell value: JSON if it parses, a bare string otherwise.
fn parse_value(input: &str) -> HostValue {
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(json) => HostValue::from_json(&json),
        Err(_) => HostValue::from(input),
    }
}

/// Parse call arguments: a JSON array, or whitespace-separated values.
fn parse_args(input: &str) -> Vec<HostValue> {
    if input.starts_with('[') {
        if let HostValue::Array(items) = parse_value(input) {
            return items;
        }
    }
    input.split_whitespace().map(parse_value).collect()
}

/// Helper for rustyline that completes and hints command names
struct ShellHelper {
    commands: Vec<&'static str>,
}

impl ShellHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "get", "set", "del", "names", "call", "invocability", "handles", "help", "clear",
                "exit",
            ],
        }
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[..pos];
        if word.is_empty() || word.contains(char::is_whitespace) {
            return Ok((pos, vec![]));
        }

        let matches = self
            .commands
            .iter()
            .filter(|c| c.starts_with(word))
            .map(|c| Pair {
                display: c.to_string(),
                replacement: c[word.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() || line.len() < 2 || line.contains(char::is_whitespace) {
            return None;
        }
        self.commands
            .iter()
            .find(|c| c.starts_with(line) && c.len() > line.len())
            .map(|c| (&c[line.len()..]).dimmed().to_string())
    }
}

impl Highlighter for ShellHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        match line.split_once(' ') {
            Some((cmd, rest)) if self.commands.contains(&cmd) => {
                Cow::Owned(format!("{} {}", cmd.magenta().bold(), rest))
            }
            _ if self.commands.contains(&line) => Cow::Owned(line.magenta().bold().to_string()),
            _ => Cow::Borrowed(line),
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// The interactive bridge shell
pub struct Shell {
    bridge: HostBridge,
    engine: Arc<dyn HostEngine>,
    target: HostHandle,
    editor: Editor<ShellHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Shell {
    /// Create a shell over a fresh bridge and a seeded property bag
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ShellHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tether")
            .join(HISTORY_FILE);
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        let handles = Arc::new(HandleTable::new());
        let engine: Arc<dyn HostEngine> =
            Arc::new(ScriptEngine::from_config("shell", Arc::clone(&handles), config)?);
        let bridge = HostBridge::new(handles);
        let target = bridge.acquire_handle(Arc::new(sample_object(Arc::clone(&engine))));

        Ok(Self {
            bridge,
            engine,
            target,
            editor,
            history_path,
        })
    }

    /// Run the shell main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "tether>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match ShellCommand::parse(trimmed) {
                        Ok(ShellCommand::Exit) => break,
                        Ok(cmd) => self.execute(cmd),
                        Err(usage) => eprintln!("{}: {}", "Usage".yellow().bold(), usage),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        if let Err(error) = self.bridge.release_handle(self.target) {
            tracing::error!(%error, "failed to release shell object");
        }
        println!();
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "tether bridge shell".white().bold(),
            "v".dimmed(),
            tether_bridge::VERSION.bright_yellow()
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            "help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute(&mut self, cmd: ShellCommand<'_>) {
        let bridge = &self.bridge;
        let target = self.target;

        with_engine(Arc::clone(&self.engine), || match cmd {
            ShellCommand::Get(name) => {
                let name = NativeString::from(name);
                print_result(bridge.get_property(target, name.as_native()), format_value);
            }
            ShellCommand::Set(name, value) => {
                let name = NativeString::from(name);
                print_result(
                    bridge.set_property(target, name.as_native(), parse_value(value)),
                    |()| "ok".dimmed().to_string(),
                );
            }
            ShellCommand::Del(name) => {
                let name = NativeString::from(name);
                print_result(bridge.delete_property(target, name.as_native()), |deleted| {
                    deleted.yellow().to_string()
                });
            }
            ShellCommand::Names => {
                print_result(bridge.get_property_names(target), |names| {
                    names.iter().map(|n| n.cyan().to_string()).collect::<Vec<_>>().join("\n")
                });
            }
            ShellCommand::Call(name, args) => {
                let name = NativeString::from(name);
                print_result(
                    bridge.invoke_method(target, name.as_native(), &parse_args(args)),
                    format_value,
                );
            }
            ShellCommand::Invocability(None) => {
                print_result(bridge.get_invocability(target), |inv| {
                    format!("{:?}", inv).magenta().to_string()
                });
            }
            ShellCommand::Invocability(Some(member)) => {
                let name = NativeString::from(member);
                match bridge.get_property(target, name.as_native()) {
                    Ok(HostValue::Object(object)) => {
                        let scoped = bridge.handles().scoped(object);
                        print_result(bridge.get_invocability(scoped.handle()), |inv| {
                            format!("{:?}", inv).magenta().to_string()
                        });
                    }
                    Ok(_) => println!("{}", "None".magenta()),
                    Err(error) => print_error(&error),
                }
            }
            ShellCommand::Handles => {
                println!(
                    "{} outstanding, shell object refs {}",
                    bridge.handles().len().yellow(),
                    bridge.handles().ref_count(target).yellow()
                );
            }
            ShellCommand::Help => print_help(),
            ShellCommand::Clear => print!("\x1B[2J\x1B[H"),
            ShellCommand::Exit => {}
        });
    }
}

/// The object the shell operates on: a bag with a few callable members.
fn sample_object(engine: Arc<dyn HostEngine>) -> PropertyBag {
    let bag = PropertyBag::new().with_engine(engine);
    bag.insert("greeting", "hello");
    bag.insert(
        "add",
        HostValue::object(
            HostFunction::new("add", |args| {
                let sum = args
                    .iter()
                    .map(|v| {
                        v.as_number()
                            .ok_or_else(|| HostFault::type_error(format!("{} is not a number", v)))
                    })
                    .sum::<Result<f64, HostFault>>()?;
                Ok(HostValue::Number(sum))
            })
            .with_arity(2),
        ),
    );
    bag.insert(
        "upper",
        HostValue::object(
            HostFunction::new("upper", |args| match args.first() {
                Some(HostValue::String(s)) => Ok(HostValue::String(s.to_uppercase())),
                _ => Err(HostFault::type_error("upper expects a string")),
            })
            .with_arity(1),
        ),
    );
    bag
}

fn print_help() {
    println!();
    println!("{}", "Shell Commands:".white().bold());
    println!();
    for (cmd, desc) in ShellCommand::all_commands() {
        println!("  {:24} {}", cmd.cyan(), desc.dimmed());
    }
    println!();
}

fn print_result<T>(result: BoundaryResult<T>, format: impl FnOnce(T) -> String) {
    match result {
        Ok(value) => println!("{}", format(value)),
        Err(error) => print_error(&error),
    }
}

/// Format a host value for display with syntax coloring
fn format_value(value: HostValue) -> String {
    let callable = value.is_invocable();
    match value {
        HostValue::Undefined => "undefined".blue().dimmed().to_string(),
        HostValue::Null => "null".blue().to_string(),
        HostValue::Boolean(b) => b.yellow().to_string(),
        HostValue::Number(n) => n.yellow().to_string(),
        HostValue::String(s) => format!("'{}'", s).green().to_string(),
        HostValue::Object(object) if callable => {
            format!("[Function {}]", object.type_name()).magenta().to_string()
        }
        other => other.to_string().cyan().to_string(),
    }
}

/// Print a script error value
fn print_error(error: &ScriptValue) {
    match error.as_error() {
        Some(error) => eprintln!("{}: {}", error.name.red().bold(), error.message),
        None => eprintln!("{}", error.to_string().red()),
    }
}
