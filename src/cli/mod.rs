// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Interactive chat input.
//!
//! - Tab completion and dim hints for slash commands
//! - Command history (slash commands only)
//! - Plain stdin fallback when not attached to a terminal
//!
//! ## Example
//!
//! ```no_run
//! use mindguard::cli::{get_canonical_command, parse_command, show_help, ChatInput};
//!
//! let mut input = ChatInput::open(None);
//! while let Some(line) = input.read_line("you> ")? {
//!     match parse_command(&line) {
//!         Some((cmd, _args)) => match get_canonical_command(cmd) {
//!             Some("/help") => show_help(),
//!             Some("/exit") => break,
//!             _ => {}
//!         },
//!         None => println!("You said: {}", line),
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod completer;
pub mod input;

pub use completer::{
    get_canonical_command, is_slash_command, parse_command, show_help, ChatCompleter, CommandInfo,
    COMMANDS,
};
pub use input::{ChatInput, InteractiveInput, SimpleInput};
