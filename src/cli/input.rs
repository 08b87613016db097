// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Line input for the chat prompt.
//!
//! Chat messages are never written to disk. Only slash commands go into the
//! history file, so arrow-up recalls `/breathe 2` but not what the student
//! said.

use anyhow::{Context, Result};
use rustyline::history::DefaultHistory;
use rustyline::{ColorMode, CompletionType, Config, EditMode, Editor};
use std::io::IsTerminal;
use std::path::PathBuf;

use super::completer::{is_slash_command, ChatCompleter};

/// Maximum history entries to keep.
const MAX_HISTORY_ENTRIES: usize = 200;

/// Interactive input handler with tab completion and command history.
pub struct InteractiveInput {
    editor: Editor<ChatCompleter, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl InteractiveInput {
    /// Create an editor, loading command history from `history_path` if given.
    pub fn new(history_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .history_ignore_dups(true)?
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .color_mode(ColorMode::Enabled)
            .auto_add_history(false)
            .max_history_size(MAX_HISTORY_ENTRIES)?
            .build();

        let mut editor = Editor::with_config(config).context("Failed to create input editor")?;
        editor.set_helper(Some(ChatCompleter::new()));
        editor.bind_sequence(
            rustyline::KeyEvent::new('\t', rustyline::Modifiers::NONE),
            rustyline::Cmd::Complete,
        );

        if let Some(ref path) = history_path {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    tracing::debug!("HISTORY_LOAD_FAILED | error={}", e);
                }
            }
        }

        Ok(Self {
            editor,
            history_path,
        })
    }

    /// Read a line of input with the given prompt.
    ///
    /// Returns `Ok(Some(line))` on input, `Ok(Some(""))` on Ctrl+C and
    /// `Ok(None)` on EOF (Ctrl+D).
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if is_slash_command(&line) {
                    let _ = self.editor.add_history_entry(line.trim());
                    self.save_history();
                }
                Ok(Some(line))
            }
            Err(rustyline::error::ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(rustyline::error::ReadlineError::Eof) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Input error: {}", e)),
        }
    }

    fn save_history(&mut self) {
        if let Some(ref path) = self.history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = self.editor.save_history(path) {
                tracing::debug!("HISTORY_SAVE_FAILED | error={}", e);
            }
        }
    }
}

/// Plain stdin input for piped or non-interactive use.
pub struct SimpleInput {
    reader: std::io::BufReader<std::io::Stdin>,
}

impl SimpleInput {
    pub fn new() -> Self {
        Self {
            reader: std::io::BufReader::new(std::io::stdin()),
        }
    }

    /// Read a line without any completion.
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        use std::io::{BufRead, Write};

        print!("{}", prompt);
        std::io::stdout().flush()?;

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line.trim_end().to_string())),
            Err(e) => Err(anyhow::anyhow!("Input error: {}", e)),
        }
    }
}

impl Default for SimpleInput {
    fn default() -> Self {
        Self::new()
    }
}

/// The editor when stdin is a terminal, plain stdin otherwise.
pub enum ChatInput {
    Interactive(Box<InteractiveInput>),
    Simple(SimpleInput),
}

impl ChatInput {
    pub fn open(history_path: Option<PathBuf>) -> Self {
        if std::io::stdin().is_terminal() {
            match InteractiveInput::new(history_path) {
                Ok(input) => return Self::Interactive(Box::new(input)),
                Err(e) => tracing::warn!("LINE_EDITOR_UNAVAILABLE | error={}", e),
            }
        }
        Self::Simple(SimpleInput::new())
    }

    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self {
            Self::Interactive(input) => input.read_line(prompt),
            Self::Simple(input) => input.read_line(prompt),
        }
    }
}
