//! Inspect trading rules from a saved exchange-info document
//!
//! Usage: `rules_inspect <exchange_info.json> [SYMBOL...]`
//!
//! Loads `.env`, builds a rules cache over the file and prints the rules for
//! each requested symbol, or a summary of everything cached when none are
//! given. Useful for checking what the cache would accept from a captured
//! `/api/v3/exchangeInfo` response without touching the network.

use anyhow::{bail, Context};
use std::rc::Rc;
use tradegate_core::prelude::*;
use tradegate_exchanges::prelude::*;

#[monoio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: rules_inspect <exchange_info.json> [SYMBOL...]");
    };
    let symbols: Vec<String> = args.map(|s| s.to_uppercase()).collect();

    let config = BinanceConfig::default()
        .with_env_overrides()
        .context("invalid TRADEGATE_* override")?;

    println!("🚀 Tradegate trading rules inspector");
    println!("====================================");
    println!("   Source: {path}");
    println!("   Cache TTL: {}ms, retry backoff: {}ms", config.cache_ttl_ms, config.retry_backoff_ms);
    println!();

    let provider = Rc::new(
        JsonFileMetadataProvider::load(&path).with_context(|| format!("could not load exchange metadata from {path}"))?,
    );
    let manager = TradingRulesManager::new(provider, config.rules_cache_config());

    let timer = PerfTimer::start("rules_inspect load");
    if !manager.force_update().await {
        bail!("could not refresh trading rules from {path}");
    }
    let load_micros = timer.elapsed_micros();
    tradegate_core::log_latency!("Exchange metadata load", load_micros);

    if symbols.is_empty() {
        print_summary(&manager).await;
        return Ok(());
    }

    let mut missing = 0;
    for symbol in &symbols {
        match manager.get_trading_rules(symbol).await {
            Some(rules) => print_rules(&rules),
            None => {
                missing += 1;
                println!("❌ {symbol}: not tradable or failed validation");
            }
        }
        println!();
    }

    if missing > 0 {
        bail!("{missing} of {} symbols have no trading rules", symbols.len());
    }
    Ok(())
}

fn print_rules(rules: &SymbolTradingRules) {
    let order_types: Vec<&str> = rules.allowed_order_types.iter().map(OrderType::as_tag).collect();

    println!("✅ {}", rules.symbol);
    println!(
        "   Price:    tick {} in [{}, {}]",
        rules.price_rules.tick_size, rules.price_rules.min_price, rules.price_rules.max_price
    );
    println!(
        "   Quantity: step {} in [{}, {}]",
        rules.quantity_rules.step_size, rules.quantity_rules.min_qty, rules.quantity_rules.max_qty
    );
    println!("   Min notional: {}", rules.min_notional);
    println!("   Order types: {}", order_types.join(", "));
}

async fn print_summary(manager: &TradingRulesManager) {
    let all = manager.get_all_trading_rules().await;
    let mut names: Vec<&String> = all.keys().collect();
    names.sort();

    println!("📋 {} tradable symbols", names.len());
    for order_type in OrderType::ALL {
        let count = all.values().filter(|rules| rules.allows(order_type)).count();
        if count > 0 {
            println!("   {:<22} {}", order_type.as_tag(), count);
        }
    }

    let preview: Vec<&str> = names.iter().take(10).map(|name| name.as_str()).collect();
    if !preview.is_empty() {
        println!("   First symbols: {}", preview.join(", "));
    }
}
