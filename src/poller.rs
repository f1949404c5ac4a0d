//! Poll loop
//!
//! Drives the agent: fetch pending commands for this device, dispatch each
//! one sequentially, acknowledge the outcome, sleep, repeat. No error in a
//! cycle ever terminates the loop; only process shutdown (or `once = true`)
//! does.

use crate::api::{AckStatus, BackendApi, Command};
use crate::commands::CommandDispatcher;
use crate::config::AgentConfig;
use crate::state::AgentStateHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct CommandPoller {
    api: Arc<dyn BackendApi>,
    dispatcher: CommandDispatcher,
    state: AgentStateHandle,
    config: AgentConfig,
}

impl CommandPoller {
    pub fn new(
        api: Arc<dyn BackendApi>,
        dispatcher: CommandDispatcher,
        state: AgentStateHandle,
        config: AgentConfig,
    ) -> Self {
        Self {
            api,
            dispatcher,
            state,
            config,
        }
    }

    /// Poll until externally terminated, or for a single cycle when `once`
    /// is set. `interval_override` replaces the configured poll interval.
    pub async fn run(&self, once: bool, interval_override: Option<u64>) {
        let interval = Duration::from_secs(
            interval_override
                .unwrap_or(self.config.poll_interval_secs)
                .max(1),
        );
        info!(
            target_device = %self.config.target_device,
            device_id = %self.config.device_id,
            interval_secs = interval.as_secs(),
            "Starting poll loop"
        );

        let device_id = Some(self.config.device_id.as_str()).filter(|id| !id.is_empty());

        loop {
            let response = match self
                .api
                .poll_commands(&self.config.target_device, device_id, 10)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, "Failed to poll device commands");
                    if once {
                        break;
                    }
                    tokio::time::sleep(interval).await;
                    continue;
                }
            };

            // Persist the poll timestamp even when nothing was delivered.
            if let Some(polled_at) = response.polled_at {
                if let Err(e) = self.state.set_last_polled_at(polled_at).await {
                    warn!(error = %e, "Failed to persist poll timestamp");
                }
            }
            if response.commands.is_empty() {
                info!(polled_at = ?response.polled_at, "No pending commands");
            }
            for command in &response.commands {
                self.process_command(command).await;
            }

            if once {
                break;
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Run one command to completion and acknowledge the outcome.
    async fn process_command(&self, command: &Command) {
        info!(command_id = command.id, action = %command.action, "Received command");
        println!(
            "Received command #{} -> {} | payload={}",
            command.id, command.action, command.payload
        );

        match self.dispatcher.handle(command).await {
            Ok(result) => {
                info!(command_id = command.id, result = %result, "Command completed");
                // Persisted before the ack so a lost ack never loses the
                // local high-water mark.
                if let Err(e) = self.state.set_last_command_id(command.id).await {
                    warn!(error = %e, "Failed to persist last command id");
                }
                self.acknowledge(command.id, AckStatus::Acknowledged).await;
            }
            Err(e) => {
                error!(command_id = command.id, error = %e, "Command failed");
                self.acknowledge(command.id, AckStatus::Failed).await;
            }
        }
    }

    /// Fire-and-forget status report. Delivery failures are logged and
    /// swallowed; the backend's view of this command may lag or be lost.
    async fn acknowledge(&self, command_id: i64, status: AckStatus) {
        if let Err(e) = self.api.acknowledge_command(command_id, status).await {
            error!(
                command_id,
                status = %status,
                error = %e,
                "Failed to deliver command acknowledgment"
            );
        }
    }
}
