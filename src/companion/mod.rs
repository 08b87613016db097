// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The chat companion: a rule-based classifier and the conversation that
//! delivers its replies.

pub mod classifier;
pub mod conversation;

pub use classifier::{Classifier, Reply, ReplyCategory};
pub use conversation::{Conversation, Delivered, ReplyDelays, GREETING};
