//! Console rendering for dashboards, previews and sell results

use crate::api::{DashboardSummary, SellOverview, SellPreview, SellResult};

/// Format a USD value with thousands separators and two decimals.
pub fn format_money(value: f64) -> String {
    group_thousands(&format!("{:.2}", value))
}

/// Format an asset quantity: up to six decimals, trailing zeros trimmed.
pub fn format_quantity(value: f64) -> String {
    let formatted = group_thousands(&format!("{:.6}", value));
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

fn group_thousands(formatted: &str) -> String {
    let (number, fraction) = match formatted.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (formatted, None),
    };
    let (sign, digits) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match fraction {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn print_dashboard(dashboard: &DashboardSummary, overview: &SellOverview) {
    println!("\n=== Desktop Dashboard ===");
    println!(
        "Portfolio balance: {} {} (cash {})",
        format_money(dashboard.portfolio_balance),
        dashboard.currency,
        format_money(dashboard.cash_balance),
    );
    println!("Market movers loaded: {}", dashboard.market_movers.len());
    println!("--- Sellable holdings ---");
    if overview.holdings.is_empty() {
        println!("No holdings available for sale.");
    }
    for holding in &overview.holdings {
        println!(
            "- {}: qty {} | price ${} | value ${} | PnL ${} ({:.2}%)",
            holding.symbol,
            format_quantity(holding.quantity),
            format_money(holding.current_price),
            format_money(holding.current_value),
            format_money(holding.unrealized_pnl),
            holding.unrealized_pnl_pct,
        );
    }
    println!("==========================\n");
}

pub fn print_preview(preview: &SellPreview) {
    println!("\n>>> Sell preview");
    println!(
        "Asset: {} ({}) | Source: {}",
        preview.name, preview.symbol, preview.price_source
    );
    println!(
        "Quantity: {} of {} available",
        format_quantity(preview.quantity),
        format_quantity(preview.available_quantity),
    );
    println!(
        "Unit price: ${} | Proceeds: ${}",
        format_money(preview.unit_price),
        format_money(preview.proceeds),
    );
}

pub fn print_sell_result(result: &SellResult) {
    println!("\n*** Sell executed ***");
    println!(
        "Sold {} {} @ ${}",
        format_quantity(result.quantity),
        result.symbol,
        format_money(result.price),
    );
    println!(
        "Received ${} | Cash balance: ${}",
        format_money(result.received),
        format_money(result.cash_balance),
    );
    println!("Total balance: ${}", format_money(result.total_balance));
    if let Some(pnl) = result.realized_pnl {
        println!("Realized PnL: ${}", format_money(pnl));
    }
    println!("*************************\n");
}

/// One-line summary returned as a command's result text.
pub fn sell_summary(result: &SellResult) -> String {
    format!(
        "Sold {} {} for {} USD",
        format_quantity(result.quantity),
        result.symbol,
        format_money(result.received),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(1234.5), "1,234.50");
        assert_eq!(format_money(987654321.987), "987,654,321.99");
        assert_eq!(format_money(-12345.0), "-12,345.00");
    }

    #[test]
    fn quantity_trims_trailing_zeros() {
        assert_eq!(format_quantity(0.5), "0.5");
        assert_eq!(format_quantity(1.0), "1");
        assert_eq!(format_quantity(0.123456), "0.123456");
        assert_eq!(format_quantity(2500.0), "2,500");
    }

    #[test]
    fn summary_line_shape() {
        let result = SellResult {
            symbol: "BTC".to_string(),
            quantity: 0.25,
            price: 40000.0,
            received: 10000.0,
            cash_balance: 15000.0,
            total_balance: 20000.0,
            realized_pnl: None,
        };
        assert_eq!(sell_summary(&result), "Sold 0.25 BTC for 10,000.00 USD");
    }
}
