//! Desktop companion agent for a crypto portfolio backend
//!
//! A long-running process that polls the backend's device command queue,
//! executes each command through an action-specific handler (including
//! operator-confirmed sell operations), and acknowledges the outcome.
//!
//! # Design
//!
//! - All backend access goes through the [`api::BackendApi`] trait so tests
//!   run against a scripted mock instead of HTTP
//! - Operator interaction goes through the [`prompt::Prompter`] capability
//! - Agent state is a single persisted record behind
//!   [`state::AgentStateHandle`], saved on every mutation

pub mod api;
pub mod commands;
pub mod config;
pub mod poller;
pub mod prompt;
pub mod state;

mod error;

// Re-export commonly used types
pub use api::{BackendApi, HttpBackend};
pub use commands::CommandDispatcher;
pub use config::AgentConfig;
pub use error::{Error, Result};
pub use poller::CommandPoller;
pub use prompt::{ConfirmPolicy, Prompter, StdinPrompter};
pub use state::{AgentState, AgentStateHandle, JsonFileStore};
