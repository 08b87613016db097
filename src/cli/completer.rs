// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tab completion and typeahead for chat slash commands.
//!
//! ## Example UX
//!
//! ```text
//! > /
//!   /help      - Show all commands
//!   /breathe   - Guided 4-7-8 breathing
//!   /contacts  - Show your emergency contacts
//!   ...
//!
//! > /br<Tab>
//!   /breathe [cycles]
//! ```

use std::borrow::Cow;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hint, Hinter};
use rustyline::validate::Validator;
use rustyline::{Context, Helper, Result};

/// Information about a slash command.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    /// Primary command name (e.g., "/help")
    pub name: &'static str,
    /// Alternative aliases (e.g., ["/h", "/?"])
    pub aliases: &'static [&'static str],
    /// Short description shown in completion
    pub description: &'static str,
    /// Arguments this command accepts (for display)
    pub args: Option<&'static str>,
    /// Suggested argument values for completion
    pub arg_values: &'static [&'static str],
}

impl CommandInfo {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            description,
            args: None,
            arg_values: &[],
        }
    }

    pub const fn with_aliases(
        name: &'static str,
        aliases: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            aliases,
            description,
            args: None,
            arg_values: &[],
        }
    }

    pub const fn with_args(mut self, args: &'static str, values: &'static [&'static str]) -> Self {
        self.args = Some(args);
        self.arg_values = values;
        self
    }

    /// Check if this command matches a given prefix.
    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name.starts_with(&input_lower)
            || self.aliases.iter().any(|a| a.starts_with(&input_lower))
    }

    /// Check if this command exactly matches a given input.
    pub fn exact_match(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name == input_lower || self.aliases.iter().any(|a| *a == input_lower)
    }

    /// Get display string for completion menu.
    pub fn display_string(&self) -> String {
        if let Some(args) = self.args {
            format!("{} {} - {}", self.name, args, self.description)
        } else {
            format!("{} - {}", self.name, self.description)
        }
    }
}

/// All chat slash commands.
pub static COMMANDS: &[CommandInfo] = &[
    CommandInfo::with_aliases("/help", &["/h", "/?"], "Show all commands"),
    CommandInfo::new("/breathe", "Guided 4-7-8 breathing").with_args("[cycles]", &["1", "2", "3", "4"]),
    CommandInfo::new("/contacts", "Show your emergency contacts"),
    CommandInfo::new("/clear", "Clear the conversation"),
    CommandInfo::with_aliases("/exit", &["/quit", "/q"], "Leave the chat"),
];

/// Completer and hinter for the chat prompt.
#[derive(Debug, Default)]
pub struct ChatCompleter;

impl ChatCompleter {
    pub fn new() -> Self {
        Self
    }

    fn get_completions(&self, line: &str, pos: usize) -> Vec<Pair> {
        let input = &line[..pos];
        if !input.starts_with('/') {
            return Vec::new();
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.len() <= 1 && !input.ends_with(' ') {
            self.complete_command(input)
        } else {
            let prefix = if input.ends_with(' ') {
                ""
            } else {
                parts.last().copied().unwrap_or("")
            };
            self.complete_arguments(parts[0], prefix, input)
        }
    }

    fn complete_command(&self, input: &str) -> Vec<Pair> {
        COMMANDS
            .iter()
            .filter(|cmd| cmd.matches(input))
            .map(|cmd| Pair {
                display: cmd.display_string(),
                replacement: format!("{} ", cmd.name),
            })
            .collect()
    }

    fn complete_arguments(&self, command: &str, prefix: &str, full_input: &str) -> Vec<Pair> {
        let Some(cmd_info) = COMMANDS.iter().find(|c| c.exact_match(command)) else {
            return Vec::new();
        };

        let base = &full_input[..full_input.len() - prefix.len()];
        cmd_info
            .arg_values
            .iter()
            .filter(|v| v.starts_with(prefix))
            .map(|v| Pair {
                display: v.to_string(),
                replacement: format!("{}{}", base, v),
            })
            .collect()
    }

    /// Hint shown in dim text after the cursor.
    fn get_hint(&self, line: &str) -> Option<CommandHint> {
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }

        let matches: Vec<_> = COMMANDS.iter().filter(|cmd| cmd.name.starts_with(line)).collect();
        if matches.len() != 1 {
            return None;
        }

        let cmd = matches[0];
        let remaining = &cmd.name[line.len()..];
        let hint = match cmd.args {
            Some(args) => format!("{} {} - {}", remaining, args, cmd.description),
            None => format!("{} - {}", remaining, cmd.description),
        };
        Some(CommandHint {
            display: hint,
            completion: remaining.to_string(),
        })
    }
}

/// A hint displayed after the cursor in dim text.
#[derive(Debug, Clone)]
pub struct CommandHint {
    display: String,
    completion: String,
}

impl Hint for CommandHint {
    fn display(&self) -> &str {
        &self.display
    }

    fn completion(&self) -> Option<&str> {
        if self.completion.is_empty() {
            None
        } else {
            Some(&self.completion)
        }
    }
}

impl Completer for ChatCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        Ok((0, self.get_completions(line, pos)))
    }
}

impl Hinter for ChatCompleter {
    type Hint = CommandHint;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }
        self.get_hint(line)
    }
}

impl Highlighter for ChatCompleter {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }

    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if !line.starts_with('/') {
            return Cow::Borrowed(line);
        }

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, Some(rest)),
            None => (line, None),
        };

        if COMMANDS.iter().any(|c| c.exact_match(command)) {
            let colored_cmd = format!("\x1b[36m{}\x1b[0m", command);
            match rest {
                Some(rest) => Cow::Owned(format!("{} {}", colored_cmd, rest)),
                None => Cow::Owned(colored_cmd),
            }
        } else if COMMANDS.iter().any(|c| c.matches(command)) {
            Cow::Owned(format!("\x1b[33m{}\x1b[0m", line))
        } else {
            Cow::Owned(format!("\x1b[31m{}\x1b[0m", line))
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for ChatCompleter {}

impl Helper for ChatCompleter {}

/// Print all chat commands (for /help).
pub fn show_help() {
    println!("\nAvailable commands:\n");
    for cmd in COMMANDS {
        let aliases = if cmd.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", cmd.aliases.join(", "))
        };
        let args = cmd.args.map_or(String::new(), |a| format!(" {}", a));

        println!("  \x1b[36m{}{}\x1b[0m{} - {}", cmd.name, args, aliases, cmd.description);
    }
    println!("\nAnything else you type is sent to MindGuard.\n");
}

/// Parse a slash command from user input.
/// Returns (command_name, arguments) if the command exists.
pub fn parse_command(input: &str) -> Option<(&str, Vec<&str>)> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input.split_whitespace();
    let command = parts.next()?;
    if COMMANDS.iter().any(|c| c.exact_match(command)) {
        Some((command, parts.collect()))
    } else {
        None
    }
}

/// Check if input looks like a slash command (even if invalid).
pub fn is_slash_command(input: &str) -> bool {
    input.trim().starts_with('/')
}

/// Get the canonical command name for an alias.
pub fn get_canonical_command(input: &str) -> Option<&'static str> {
    COMMANDS.iter().find(|c| c.exact_match(input)).map(|c| c.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_matching() {
        let help = &COMMANDS[0];
        assert!(help.matches("/hel"));
        assert!(help.matches("/?"));
        assert!(!help.matches("/breathe"));
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/help"), Some(("/help", vec![])));
        assert_eq!(parse_command("  /breathe 2 "), Some(("/breathe", vec!["2"])));
        assert_eq!(parse_command("/EXIT"), Some(("/EXIT", vec![])));
        assert_eq!(parse_command("I feel sad"), None);
        assert_eq!(parse_command("/model"), None);
    }

    #[test]
    fn test_get_canonical_command() {
        assert_eq!(get_canonical_command("/h"), Some("/help"));
        assert_eq!(get_canonical_command("/quit"), Some("/exit"));
        assert_eq!(get_canonical_command("/Q"), Some("/exit"));
        assert_eq!(get_canonical_command("/nope"), None);
    }

    #[test]
    fn test_is_slash_command() {
        assert!(is_slash_command("  /anything"));
        assert!(!is_slash_command("hello /help"));
    }

    #[test]
    fn test_complete_command_prefix() {
        let completer = ChatCompleter::new();
        let pairs = completer.get_completions("/c", 2);
        let names: Vec<_> = pairs.iter().map(|p| p.replacement.as_str()).collect();
        assert_eq!(names, vec!["/contacts ", "/clear "]);
    }

    #[test]
    fn test_complete_breathe_cycles() {
        let completer = ChatCompleter::new();
        let pairs = completer.get_completions("/breathe ", 9);
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[1].replacement, "/breathe 2");

        let pairs = completer.get_completions("/breathe 3", 10);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].replacement, "/breathe 3");
    }

    #[test]
    fn test_plain_text_has_no_completions() {
        let completer = ChatCompleter::new();
        assert!(completer.get_completions("hello", 5).is_empty());
        assert!(completer.get_hint("hello").is_none());
    }

    #[test]
    fn test_hint_for_unique_prefix() {
        let completer = ChatCompleter::new();
        let hint = completer.get_hint("/br").unwrap();
        assert_eq!(hint.completion(), Some("eathe"));
        assert!(hint.display().contains("[cycles]"));
        assert!(completer.get_hint("/c").is_none());
    }
}
