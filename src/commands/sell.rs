//! Interactive sell workflow
//!
//! A forward-only sequence of bounded prompts that turns a
//! `REQUEST_DESKTOP_SELL` command into a confirmed trade: pick an asset,
//! pick a price source, pick how much to sell, preview, confirm, execute.
//! Payload fields are treated as hints for defaults only, never as binding
//! parameters. Invalid input re-prompts; a validated answer is final.

use crate::api::{BackendApi, Holding, PriceSource, SellAmount, SellIntent};
use crate::commands::render::{self, format_money, format_quantity};
use crate::prompt::{ConfirmPolicy, Prompter};
use crate::{Error, Result};
use serde::Deserialize;
use tracing::info;

/// Optional hints carried by the command payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellHints {
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub amount_usd: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SellHints {
    /// Hints are best-effort: a payload that does not deserialize cleanly
    /// simply yields no hints.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }
}

enum AmountMode {
    Quantity,
    Usd,
}

pub struct SellWorkflow<'a> {
    api: &'a dyn BackendApi,
    prompter: &'a dyn Prompter,
    confirm: ConfirmPolicy,
}

impl<'a> SellWorkflow<'a> {
    pub fn new(api: &'a dyn BackendApi, prompter: &'a dyn Prompter, confirm: ConfirmPolicy) -> Self {
        Self {
            api,
            prompter,
            confirm,
        }
    }

    /// Drive the whole workflow and return the command's result text.
    pub async fn run(&self, hints: &SellHints) -> Result<String> {
        let overview = self.api.get_sell_overview().await?;
        let holding = self.select_asset(&overview.holdings, hints).await?;
        let source = self.select_price_source(hints).await?;
        let amount = self.select_amount(holding, hints).await?;

        let intent = SellIntent {
            asset_id: holding.id.clone(),
            source,
            amount,
        };

        // Quote immediately before asking; an earlier preview may be stale.
        let preview = self.api.preview_sell(&intent).await?;
        render::print_preview(&preview);

        let message = format!(
            "Sell {} {} for {} USD?",
            format_quantity(preview.quantity),
            preview.symbol,
            format_money(preview.proceeds),
        );
        if !self.confirm.confirm(self.prompter, &message).await? {
            return Err(Error::command("User rejected sell command"));
        }

        let result = self.api.execute_sell(&intent).await?;
        render::print_sell_result(&result);
        info!(symbol = %result.symbol, received = result.received, "Interactive sell executed");
        Ok(render::sell_summary(&result))
    }

    async fn select_asset<'h>(
        &self,
        holdings: &'h [Holding],
        hints: &SellHints,
    ) -> Result<&'h Holding> {
        if holdings.is_empty() {
            return Err(Error::command("No sellable holdings available"));
        }

        println!("Sellable holdings:");
        for (i, holding) in holdings.iter().enumerate() {
            println!(
                "  {}. {} ({}) qty {} @ ${}",
                i + 1,
                holding.symbol,
                holding.name,
                format_quantity(holding.quantity),
                format_money(holding.current_price),
            );
        }

        let default_index = default_asset_index(holdings, hints);
        let default_label = format!("{}", default_index + 1);

        loop {
            let answer = self
                .prompter
                .prompt("Select asset to sell (index, id or symbol)", Some(&default_label))
                .await?;
            if answer.is_empty() {
                return Ok(&holdings[default_index]);
            }
            if let Ok(index) = answer.parse::<usize>() {
                if (1..=holdings.len()).contains(&index) {
                    return Ok(&holdings[index - 1]);
                }
                println!("Enter an index between 1 and {}.", holdings.len());
                continue;
            }
            if let Some(holding) = holdings.iter().find(|h| {
                h.id.eq_ignore_ascii_case(&answer) || h.symbol.eq_ignore_ascii_case(&answer)
            }) {
                return Ok(holding);
            }
            println!("No holding matches '{}'. Use an index, asset id or symbol.", answer);
        }
    }

    async fn select_price_source(&self, hints: &SellHints) -> Result<PriceSource> {
        let default: PriceSource = hints
            .source
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        loop {
            let answer = self
                .prompter
                .prompt("Price source (coincap/coingecko)", Some(default.as_str()))
                .await?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<PriceSource>() {
                Ok(source) => return Ok(source),
                Err(()) => println!("Unknown price source '{}'. Use coincap or coingecko.", answer),
            }
        }
    }

    async fn select_amount(&self, holding: &Holding, hints: &SellHints) -> Result<SellAmount> {
        // A zero-quantity position has no valid amount in (0, available].
        if holding.quantity <= 0.0 {
            return Err(Error::command(format!(
                "No sellable quantity of {} available",
                holding.symbol
            )));
        }

        let max_amount_usd = if holding.current_price > 0.0 {
            Some(holding.current_price * holding.quantity)
        } else {
            None
        };

        let mode = match max_amount_usd {
            None => {
                // Without a live price a USD amount cannot be bounded.
                println!("No current price for {}; selling by quantity.", holding.symbol);
                AmountMode::Quantity
            }
            Some(max_usd) => self.select_amount_mode(hints, max_usd).await?,
        };

        match mode {
            AmountMode::Quantity => {
                let quantity = self
                    .select_bounded(
                        &format!("Quantity of {} to sell", holding.symbol),
                        holding.quantity,
                        hints.quantity,
                        format_quantity,
                    )
                    .await?;
                Ok(SellAmount::Quantity(quantity))
            }
            AmountMode::Usd => {
                let max_usd = max_amount_usd.unwrap_or_default();
                let amount = self
                    .select_bounded("USD amount to sell", max_usd, hints.amount_usd, |v| {
                        format!("{:.2}", v)
                    })
                    .await?;
                Ok(SellAmount::Usd(amount))
            }
        }
    }

    async fn select_amount_mode(&self, hints: &SellHints, max_usd: f64) -> Result<AmountMode> {
        let default_is_usd = hints.amount_usd.is_some() && hints.quantity.is_none() && max_usd > 0.0;
        let default_label = if default_is_usd { "a" } else { "q" };

        loop {
            let answer = self
                .prompter
                .prompt("Sell by (q)uantity or USD (a)mount", Some(default_label))
                .await?;
            if answer.is_empty() {
                return Ok(if default_is_usd {
                    AmountMode::Usd
                } else {
                    AmountMode::Quantity
                });
            }
            match answer.to_lowercase().as_str() {
                "q" | "quantity" => return Ok(AmountMode::Quantity),
                "a" | "amount" | "usd" => return Ok(AmountMode::Usd),
                other => println!("Answer 'q' for quantity or 'a' for USD amount, not '{}'.", other),
            }
        }
    }

    /// Prompt for a number in `(0, max]`, re-prompting until valid.
    ///
    /// The default is the hint clamped to the bound (or the bound itself),
    /// so blank input always yields a valid value.
    async fn select_bounded(
        &self,
        label: &str,
        max: f64,
        hint: Option<f64>,
        render_value: impl Fn(f64) -> String,
    ) -> Result<f64> {
        let default = hint.filter(|v| *v > 0.0).unwrap_or(max).min(max);
        let default_label = render_value(default);

        loop {
            let answer = self.prompter.prompt(label, Some(&default_label)).await?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<f64>() {
                Err(_) => println!("'{}' is not a number.", answer),
                Ok(value) if value <= 0.0 => println!("The value must be greater than zero."),
                Ok(value) if value > max => {
                    println!("Only {} is available.", render_value(max))
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

fn default_asset_index(holdings: &[Holding], hints: &SellHints) -> usize {
    if let Some(id) = hints.asset_id.as_deref() {
        if let Some(i) = holdings.iter().position(|h| h.id.eq_ignore_ascii_case(id)) {
            return i;
        }
    }
    if let Some(symbol) = hints.symbol.as_deref() {
        if let Some(i) = holdings
            .iter()
            .position(|h| h.symbol.eq_ignore_ascii_case(symbol))
        {
            return i;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::MockBackend;
    use crate::api::{SellOverview, SellPreview, SellResult};
    use crate::prompt::testing::ScriptedPrompter;

    fn holding(id: &str, symbol: &str, quantity: f64, price: f64) -> Holding {
        Holding {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            quantity,
            current_price: price,
            current_value: quantity * price,
            unrealized_pnl: 0.0,
            unrealized_pnl_pct: 0.0,
        }
    }

    fn backend_with(holdings: Vec<Holding>) -> MockBackend {
        let backend = MockBackend::default();
        *backend.overview.lock().unwrap() = Some(SellOverview { holdings });
        *backend.preview.lock().unwrap() = Some(SellPreview {
            symbol: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            price_source: "coincap".to_string(),
            quantity: 0.5,
            available_quantity: 2.0,
            unit_price: 40_000.0,
            proceeds: 20_000.0,
        });
        *backend.sell_result.lock().unwrap() = Some(SellResult {
            symbol: "BTC".to_string(),
            quantity: 0.5,
            price: 40_000.0,
            received: 20_000.0,
            cash_balance: 25_000.0,
            total_balance: 85_000.0,
            realized_pnl: Some(1_000.0),
        });
        backend
    }

    fn ask_policy() -> ConfirmPolicy {
        ConfirmPolicy::new(None, false)
    }

    #[tokio::test]
    async fn empty_holdings_fail_before_any_prompt() {
        let backend = backend_with(vec![]);
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        let err = workflow.run(&SellHints::default()).await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(prompter.question_count(), 0);
        assert!(backend.preview_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_answers_walk_the_defaults() {
        let backend = backend_with(vec![
            holding("ethereum", "ETH", 10.0, 2_000.0),
            holding("bitcoin", "BTC", 2.0, 40_000.0),
        ]);
        // Asset hint resolves the default to the second holding.
        let hints = SellHints {
            asset_id: Some("BITCOIN".to_string()),
            ..SellHints::default()
        };
        // asset, source, mode, quantity, confirm
        let prompter = ScriptedPrompter::new(["", "", "", "", "y"]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        let summary = workflow.run(&hints).await.unwrap();
        assert_eq!(summary, "Sold 0.5 BTC for 20,000.00 USD");

        let previews = backend.preview_calls.lock().unwrap();
        let executes = backend.execute_calls.lock().unwrap();
        assert_eq!(previews.len(), 1);
        // Execute reuses the exact previewed parameters.
        assert_eq!(executes.as_slice(), previews.as_slice());
        assert_eq!(previews[0].asset_id, "bitcoin");
        assert_eq!(previews[0].source, PriceSource::Coincap);
        // Default quantity is the full available amount.
        assert_eq!(previews[0].amount, SellAmount::Quantity(2.0));
    }

    #[tokio::test]
    async fn reprompts_until_input_validates() {
        let backend = backend_with(vec![
            holding("ethereum", "ETH", 10.0, 2_000.0),
            holding("bitcoin", "BTC", 2.0, 40_000.0),
        ]);
        let prompter = ScriptedPrompter::new([
            "dogecoin", // unknown asset
            "99",       // index out of range
            "btc",      // symbol match, case-insensitive
            "binance",  // unknown source
            "CoinGecko",
            "q",
            "abc", // not a number
            "-1",  // not positive
            "5",   // above available (2.0)
            "1.5",
            "yes",
        ]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        workflow.run(&SellHints::default()).await.unwrap();

        let previews = backend.preview_calls.lock().unwrap();
        assert_eq!(previews[0].asset_id, "bitcoin");
        assert_eq!(previews[0].source, PriceSource::Coingecko);
        assert_eq!(previews[0].amount, SellAmount::Quantity(1.5));
    }

    #[tokio::test]
    async fn source_hint_becomes_the_default() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 2.0, 40_000.0)]);
        let hints = SellHints {
            source: Some("CoinGecko".to_string()),
            ..SellHints::default()
        };
        let prompter = ScriptedPrompter::new(["", "", "", "", "y"]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        workflow.run(&hints).await.unwrap();

        let previews = backend.preview_calls.lock().unwrap();
        assert_eq!(previews[0].source, PriceSource::Coingecko);
    }

    #[tokio::test]
    async fn zero_quantity_holding_fails_instead_of_selling_nothing() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 0.0, 40_000.0)]);
        // asset, source; the workflow fails before any amount prompt
        let prompter = ScriptedPrompter::new(["", ""]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        let err = workflow.run(&SellHints::default()).await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(prompter.question_count(), 2);
        assert!(backend.preview_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_price_forces_quantity_mode() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 2.0, 0.0)]);
        // asset, source, quantity, confirm; no mode question is ever asked
        let prompter = ScriptedPrompter::new(["", "", "1", "y"]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        workflow.run(&SellHints::default()).await.unwrap();

        assert_eq!(prompter.question_count(), 4);
        let previews = backend.preview_calls.lock().unwrap();
        assert_eq!(previews[0].amount, SellAmount::Quantity(1.0));
    }

    #[tokio::test]
    async fn usd_hint_defaults_to_amount_mode_and_is_clamped() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 2.0, 40_000.0)]);
        let hints = SellHints {
            amount_usd: Some(500_000.0), // above max 80,000, clamped by the default
            ..SellHints::default()
        };
        // asset, source, mode, amount, confirm
        let prompter = ScriptedPrompter::new(["", "", "", "", "y"]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        workflow.run(&hints).await.unwrap();

        let previews = backend.preview_calls.lock().unwrap();
        assert_eq!(previews[0].amount, SellAmount::Usd(80_000.0));
    }

    #[tokio::test]
    async fn quantity_hint_keeps_quantity_mode_despite_usd_hint() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 2.0, 40_000.0)]);
        let hints = SellHints {
            quantity: Some(0.5),
            amount_usd: Some(100.0),
            ..SellHints::default()
        };
        let prompter = ScriptedPrompter::new(["", "", "", "", "y"]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        workflow.run(&hints).await.unwrap();

        let previews = backend.preview_calls.lock().unwrap();
        assert_eq!(previews[0].amount, SellAmount::Quantity(0.5));
    }

    #[tokio::test]
    async fn declining_confirmation_executes_nothing() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 2.0, 40_000.0)]);
        let prompter = ScriptedPrompter::new(["", "", "", "", "n"]);
        let workflow = SellWorkflow::new(&backend, &prompter, ask_policy());

        let err = workflow.run(&SellHints::default()).await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(backend.preview_calls.lock().unwrap().len(), 1);
        assert!(backend.execute_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_confirm_skips_the_confirmation_prompt() {
        let backend = backend_with(vec![holding("bitcoin", "BTC", 2.0, 40_000.0)]);
        // asset, source, mode, quantity; no confirmation prompt
        let prompter = ScriptedPrompter::new(["", "", "", ""]);
        let workflow = SellWorkflow::new(&backend, &prompter, ConfirmPolicy::new(Some(true), false));

        workflow.run(&SellHints::default()).await.unwrap();
        assert_eq!(prompter.question_count(), 4);
        assert_eq!(backend.execute_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn hints_survive_malformed_payloads() {
        let hints = SellHints::from_payload(&serde_json::json!("not an object"));
        assert!(hints.asset_id.is_none());

        let hints = SellHints::from_payload(&serde_json::json!({
            "asset_id": "bitcoin",
            "quantity": 0.5,
            "unrelated": true,
        }));
        assert_eq!(hints.asset_id.as_deref(), Some("bitcoin"));
        assert_eq!(hints.quantity, Some(0.5));
    }
}
