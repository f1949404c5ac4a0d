//! Wire types for the portfolio backend API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A unit of work delivered by the backend command queue.
#[derive(Debug, Clone, Deserialize)]
pub struct Command {
    pub id: i64,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// Terminal status reported back for a processed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Acknowledged,
    Failed,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Acknowledged => "ACKNOWLEDGED",
            AckStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price feed used to quote a sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[default]
    Coincap,
    Coingecko,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Coincap => "coincap",
            PriceSource::Coingecko => "coingecko",
        }
    }
}

impl FromStr for PriceSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coincap" => Ok(PriceSource::Coincap),
            "coingecko" => Ok(PriceSource::Coingecko),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the asset a sell covers. Exactly one dimension is ever set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SellAmount {
    /// Asset units
    Quantity(f64),
    /// USD value at the quoted price
    Usd(f64),
}

/// Parameters of a prospective sell, shared by preview and execute so the
/// executed trade always matches the quoted one.
#[derive(Debug, Clone, PartialEq)]
pub struct SellIntent {
    pub asset_id: String,
    pub source: PriceSource,
    pub amount: SellAmount,
}

impl SellIntent {
    /// Request body for `/crypto/sell/preview` and `/crypto/sell`.
    pub fn to_body(&self) -> Value {
        let mut body = serde_json::json!({
            "asset_id": self.asset_id,
            "source": self.source.as_str(),
        });
        match self.amount {
            SellAmount::Quantity(q) => body["quantity"] = q.into(),
            SellAmount::Usd(a) => body["amount_usd"] = a.into(),
        }
        body
    }
}

/// A sellable position, snapshotted per workflow invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct Holding {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub quantity: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub unrealized_pnl: f64,
    #[serde(default)]
    pub unrealized_pnl_pct: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellOverview {
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

/// Non-binding quote for a prospective sell.
#[derive(Debug, Clone, Deserialize)]
pub struct SellPreview {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price_source: String,
    pub quantity: f64,
    #[serde(default)]
    pub available_quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
    pub proceeds: f64,
}

/// Terminal artifact of a successful execute.
#[derive(Debug, Clone, Deserialize)]
pub struct SellResult {
    pub symbol: String,
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    pub received: f64,
    #[serde(default)]
    pub cash_balance: f64,
    #[serde(default)]
    pub total_balance: f64,
    #[serde(default)]
    pub realized_pnl: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardSummary {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub portfolio_balance: f64,
    #[serde(default)]
    pub cash_balance: f64,
    #[serde(default)]
    pub market_movers: Vec<Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub polled_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_source_parses_case_insensitively() {
        assert_eq!("CoinCap".parse::<PriceSource>(), Ok(PriceSource::Coincap));
        assert_eq!(" coingecko ".parse::<PriceSource>(), Ok(PriceSource::Coingecko));
        assert!("binance".parse::<PriceSource>().is_err());
    }

    #[test]
    fn sell_intent_body_carries_exactly_one_dimension() {
        let by_quantity = SellIntent {
            asset_id: "bitcoin".to_string(),
            source: PriceSource::Coincap,
            amount: SellAmount::Quantity(0.5),
        };
        let body = by_quantity.to_body();
        assert_eq!(body["quantity"], 0.5);
        assert!(body.get("amount_usd").is_none());

        let by_usd = SellIntent {
            amount: SellAmount::Usd(100.0),
            ..by_quantity
        };
        let body = by_usd.to_body();
        assert_eq!(body["amount_usd"], 100.0);
        assert!(body.get("quantity").is_none());
    }

    #[test]
    fn ack_status_wire_names() {
        assert_eq!(AckStatus::Acknowledged.as_str(), "ACKNOWLEDGED");
        assert_eq!(AckStatus::Failed.as_str(), "FAILED");
    }

    #[test]
    fn command_tolerates_missing_action_and_payload() {
        let command: Command = serde_json::from_value(serde_json::json!({"id": 3})).unwrap();
        assert_eq!(command.id, 3);
        assert!(command.action.is_empty());
        assert!(command.payload.is_null());
    }
}
