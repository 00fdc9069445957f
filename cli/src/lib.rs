//! haven-cli library; exposes the command handlers for unit tests.

pub mod commands;
