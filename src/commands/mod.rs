//! Device command dispatch
//!
//! Maps a polled command's action tag onto a handler. Precondition failures
//! (missing auth, bad payload, operator rejection) surface as
//! [`Error::Command`]; everything else propagates to the poll loop, which
//! owns the acknowledgment.

pub mod render;
pub mod sell;

use crate::api::{BackendApi, Command, PriceSource, SellAmount, SellIntent};
use crate::commands::render::{format_money, format_quantity};
use crate::commands::sell::{SellHints, SellWorkflow};
use crate::prompt::{ConfirmPolicy, Prompter};
use crate::state::AgentStateHandle;
use crate::{Error, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

/// Closed set of actions the backend can address to this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    LoginOnDesktop,
    OpenDesktopDashboard,
    ExecuteDesktopSell,
    RequestDesktopSell,
    Unknown(String),
}

impl DeviceAction {
    /// Case-insensitive parse; anything unrecognized (including an empty
    /// action) lands in `Unknown`.
    pub fn parse(action: &str) -> Self {
        match action.trim().to_uppercase().as_str() {
            "LOGIN_ON_DESKTOP" => DeviceAction::LoginOnDesktop,
            "OPEN_DESKTOP_DASHBOARD" => DeviceAction::OpenDesktopDashboard,
            "EXECUTE_DESKTOP_SELL" => DeviceAction::ExecuteDesktopSell,
            "REQUEST_DESKTOP_SELL" => DeviceAction::RequestDesktopSell,
            other => DeviceAction::Unknown(other.to_string()),
        }
    }
}

pub struct CommandDispatcher {
    api: Arc<dyn BackendApi>,
    state: AgentStateHandle,
    prompter: Arc<dyn Prompter>,
    confirm: ConfirmPolicy,
}

impl CommandDispatcher {
    pub fn new(
        api: Arc<dyn BackendApi>,
        state: AgentStateHandle,
        prompter: Arc<dyn Prompter>,
        confirm: ConfirmPolicy,
    ) -> Self {
        Self {
            api,
            state,
            prompter,
            confirm,
        }
    }

    /// Run the handler for one command and return its result text.
    pub async fn handle(&self, command: &Command) -> Result<String> {
        let action = DeviceAction::parse(&command.action);
        info!(command_id = command.id, action = ?action, "Processing command");
        match action {
            DeviceAction::LoginOnDesktop => self.handle_login(command).await,
            DeviceAction::OpenDesktopDashboard => self.handle_dashboard().await,
            DeviceAction::ExecuteDesktopSell => self.handle_execute_sell(command).await,
            DeviceAction::RequestDesktopSell => self.handle_request_sell(command).await,
            DeviceAction::Unknown(name) => Err(Error::command(format!(
                "Unsupported action: {}",
                if name.is_empty() { "<empty>" } else { name.as_str() }
            ))),
        }
    }

    async fn handle_login(&self, command: &Command) -> Result<String> {
        let token = command
            .payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::command("LOGIN_ON_DESKTOP payload does not contain access_token"))?;

        self.state.set_token(Some(token.to_string())).await?;
        self.api.set_token(Some(SecretString::from(token.to_string())));
        info!("Stored access token delivered by mobile command");
        Ok("Access token saved".to_string())
    }

    async fn handle_dashboard(&self) -> Result<String> {
        self.require_token().await?;
        let dashboard = self.api.get_dashboard().await?;
        let overview = self.api.get_sell_overview().await?;
        render::print_dashboard(&dashboard, &overview);
        Ok("Dashboard rendered".to_string())
    }

    async fn handle_execute_sell(&self, command: &Command) -> Result<String> {
        self.require_token().await?;

        let payload = &command.payload;
        let asset_id = payload
            .get("asset_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::command("EXECUTE_DESKTOP_SELL payload is missing asset_id"))?;
        let quantity = payload.get("quantity").and_then(|v| v.as_f64());
        let amount_usd = payload.get("amount_usd").and_then(|v| v.as_f64());
        let source = payload
            .get("source")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<PriceSource>().ok())
            .unwrap_or_default();

        // Quantity wins when the payload carries both dimensions.
        let amount = match (quantity, amount_usd) {
            (Some(q), _) => SellAmount::Quantity(q),
            (None, Some(a)) => SellAmount::Usd(a),
            (None, None) => {
                return Err(Error::command(
                    "EXECUTE_DESKTOP_SELL payload requires quantity or amount_usd",
                ))
            }
        };
        let intent = SellIntent {
            asset_id: asset_id.to_string(),
            source,
            amount,
        };

        let preview = self.api.preview_sell(&intent).await?;
        render::print_preview(&preview);

        let message = format!(
            "Sell {} {} for {} USD?",
            format_quantity(preview.quantity),
            preview.symbol,
            format_money(preview.proceeds),
        );
        if !self.confirm.confirm(self.prompter.as_ref(), &message).await? {
            return Err(Error::command("User rejected sell command"));
        }

        let result = self.api.execute_sell(&intent).await?;
        render::print_sell_result(&result);
        Ok(render::sell_summary(&result))
    }

    async fn handle_request_sell(&self, command: &Command) -> Result<String> {
        self.require_token().await?;
        let hints = SellHints::from_payload(&command.payload);
        SellWorkflow::new(self.api.as_ref(), self.prompter.as_ref(), self.confirm)
            .run(&hints)
            .await
    }

    /// Authenticated handlers fail fast instead of issuing a doomed call.
    async fn require_token(&self) -> Result<()> {
        match self.state.access_token().await {
            Some(token) if !token.is_empty() => Ok(()),
            _ => Err(Error::command(
                "Desktop is not authenticated. Log in or send LOGIN_ON_DESKTOP from mobile.",
            )),
        }
    }
}
