//! Trading rules cache
//!
//! Lazily refreshed copy of the exchange's per-symbol rules. A refresh is only
//! attempted when the cache is stale and the previous attempt is outside the
//! retry backoff, so an upstream outage costs at most one provider call per
//! backoff window and callers keep getting the last good rules meanwhile.

use crate::binance::types::parse_exchange_info;
use crate::traits::MetadataProvider;
use crate::types::SymbolTradingRules;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tradegate_core::{Clock, PerfTimer, SystemClock, Timestamp};

/// Refresh timing for [`TradingRulesManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulesCacheConfig {
    /// How long cached rules count as fresh after a successful refresh
    pub cache_ttl: Duration,
    /// Minimum spacing between refresh attempts
    pub retry_backoff: Duration,
}

impl Default for RulesCacheConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            retry_backoff: Duration::from_secs(30),
        }
    }
}

/// Per-symbol trading rules with TTL and retry backoff
pub struct TradingRulesManager {
    provider: Rc<dyn MetadataProvider>,
    config: RulesCacheConfig,
    clock: Rc<dyn Clock>,
    rules: RefCell<Rc<HashMap<String, SymbolTradingRules>>>,
    last_successful_update: Cell<Option<Timestamp>>,
    last_update_attempt: Cell<Option<Timestamp>>,
}

impl TradingRulesManager {
    pub fn new(provider: Rc<dyn MetadataProvider>, config: RulesCacheConfig) -> Self {
        Self::with_clock(provider, config, Rc::new(SystemClock::new()))
    }

    pub fn with_clock(provider: Rc<dyn MetadataProvider>, config: RulesCacheConfig, clock: Rc<dyn Clock>) -> Self {
        debug!(
            "Trading rules cache: ttl={:?} backoff={:?} clock={}",
            config.cache_ttl,
            config.retry_backoff,
            clock.name()
        );
        Self {
            provider,
            config,
            clock,
            rules: RefCell::new(Rc::new(HashMap::new())),
            last_successful_update: Cell::new(None),
            last_update_attempt: Cell::new(None),
        }
    }

    /// Rules for one symbol, or `None` if it is unknown or not tradable
    pub async fn get_trading_rules(&self, symbol: &str) -> Option<SymbolTradingRules> {
        self.ensure_fresh().await;
        self.rules.borrow().get(symbol).cloned()
    }

    /// Owned copy of every cached symbol's rules
    pub async fn get_all_trading_rules(&self) -> HashMap<String, SymbolTradingRules> {
        self.ensure_fresh().await;
        let snapshot = Rc::clone(&self.rules.borrow());
        (*snapshot).clone()
    }

    /// Refresh now, ignoring TTL and backoff. Returns whether the fetch succeeded.
    pub async fn force_update(&self) -> bool {
        info!("🔄 Forcing trading rules refresh");
        self.refresh().await
    }

    /// Number of cached symbols, without triggering a refresh
    pub fn cached_symbol_count(&self) -> usize {
        self.rules.borrow().len()
    }

    /// Time of the last successful refresh
    pub fn last_successful_update(&self) -> Option<Timestamp> {
        self.last_successful_update.get()
    }

    pub fn config(&self) -> RulesCacheConfig {
        self.config
    }

    /// Gate a refresh on TTL and backoff. Returns whether any rules are usable.
    async fn ensure_fresh(&self) -> bool {
        let now = self.clock.now();
        let has_rules = self.cached_symbol_count() > 0;

        if has_rules && within(now, self.last_successful_update.get(), self.config.cache_ttl, true) {
            return true;
        }

        if within(now, self.last_update_attempt.get(), self.config.retry_backoff, false) {
            debug!("Trading rules refresh suppressed by retry backoff");
            return has_rules;
        }

        self.refresh().await
    }

    async fn refresh(&self) -> bool {
        // Recorded before the fetch so a slow or failing provider still gates retries
        let now = self.clock.now();
        self.last_update_attempt.set(Some(now));

        let timer = PerfTimer::start("exchange metadata fetch");
        let result = self.provider.fetch_exchange_metadata().await;
        timer.log_elapsed();

        match result {
            Ok(document) => {
                let rules = parse_exchange_info(&document);
                let count = rules.len();
                *self.rules.borrow_mut() = Rc::new(rules);
                self.last_successful_update.set(Some(now));
                info!("📋 Trading rules refreshed: {} tradable symbols", count);
                true
            }
            Err(e) => {
                let cached = self.cached_symbol_count();
                warn!(
                    "⚠️ Trading rules refresh failed: {} (serving {} cached symbols)",
                    e, cached
                );
                false
            }
        }
    }
}

/// Whether `now` lies inside the window that started at `since`
fn within(now: Timestamp, since: Option<Timestamp>, window: Duration, inclusive: bool) -> bool {
    let Some(since) = since else {
        return false;
    };
    let elapsed = u128::from(now.millis_since(since));
    let window = window.as_millis();
    if inclusive { elapsed <= window } else { elapsed < window }
}
