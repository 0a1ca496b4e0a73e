// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin stdout protocol.
//!
//! Wire format: one UTF-8 JSON object per `\n`-terminated line, tagged by a
//! `msg` field with the payload under `data`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod message;

pub use message::{decode_line, Finish, PluginMessage, Progress, ProtocolError};
