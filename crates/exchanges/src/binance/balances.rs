//! Account balances: pull snapshots and a shared push subscription
//!
//! Any number of subscribers share one user-stream connection. The connection
//! is opened by the first subscriber and closed when the last one leaves.
//!
//! ```text
//! Closed --subscribe--> Opening --open ok--> Open --last unsubscribe--> Closing --> Closed
//!                          \--open failed--> Closed
//! ```
//!
//! The stream stays `Opening` until the account subscribe request has been
//! sent. Subscribers joining meanwhile wait for that outcome and get the same
//! result as the subscriber that started the open.

use crate::binance::auth::BinanceCredentials;
use crate::binance::types::{StreamMessage, UserStreamEvent, filter_non_zero_balances, parse_stream_message};
use crate::errors::{ExchangeError, Result};
use crate::traits::{AccountProvider, StreamConnection, StreamEvents, StreamingTransport};
use crate::types::AssetBalance;
use std::cell::{Cell, RefCell};
use std::future::poll_fn;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::task::{Poll, Waker};
use tracing::{debug, error, info, warn};
use tradegate_core::{PerfTimer, log_error};

/// Settings for the account update stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceStreamConfig {
    /// `recvWindow` attached to the account subscribe request
    pub recv_window_ms: u64,
}

impl Default for BalanceStreamConfig {
    fn default() -> Self {
        Self { recv_window_ms: 5000 }
    }
}

/// Receiver of non-zero balance sets pushed from the stream
pub trait BalanceSubscriber {
    fn on_balances(&self, balances: &[AssetBalance]) -> anyhow::Result<()>;
}

impl<F> BalanceSubscriber for F
where
    F: Fn(&[AssetBalance]) -> anyhow::Result<()>,
{
    fn on_balances(&self, balances: &[AssetBalance]) -> anyhow::Result<()> {
        self(balances)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Opening => "opening",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Result of one open attempt, settled once by the opener
#[derive(Default)]
struct OpenOutcome {
    result: RefCell<Option<Result<()>>>,
    waiters: RefCell<Vec<Waker>>,
}

impl OpenOutcome {
    fn settle(&self, result: Result<()>) {
        *self.result.borrow_mut() = Some(result);
        let waiters: Vec<Waker> = self.waiters.borrow_mut().drain(..).collect();
        for waker in waiters {
            waker.wake();
        }
    }

    async fn wait(&self) -> Result<()> {
        poll_fn(|cx| {
            if let Some(result) = self.result.borrow().as_ref() {
                return Poll::Ready(result.clone());
            }
            self.waiters.borrow_mut().push(cx.waker().clone());
            Poll::Pending
        })
        .await
    }
}

/// State shared with the event handler of the current connection
struct StreamShared {
    subscribers: RefCell<Vec<Rc<dyn BalanceSubscriber>>>,
    state: Cell<ConnectionState>,
    connection: RefCell<Option<Rc<dyn StreamConnection>>>,
    generation: Cell<u64>,
    /// Set while `state` is `Opening`
    pending_open: RefCell<Option<Rc<OpenOutcome>>>,
}

impl StreamShared {
    fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            state: Cell::new(ConnectionState::Closed),
            connection: RefCell::new(None),
            generation: Cell::new(0),
            pending_open: RefCell::new(None),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
            && matches!(self.state.get(), ConnectionState::Opening | ConnectionState::Open)
    }

    fn has_subscribers(&self) -> bool {
        !self.subscribers.borrow().is_empty()
    }

    fn insert(&self, subscriber: &Rc<dyn BalanceSubscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.iter().any(|s| Rc::ptr_eq(s, subscriber)) {
            return false;
        }
        subscribers.push(Rc::clone(subscriber));
        true
    }

    fn remove(&self, subscriber: &Rc<dyn BalanceSubscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|s| !Rc::ptr_eq(s, subscriber));
        subscribers.len() != before
    }

    /// Push to a snapshot of the subscriber set, isolating failures
    fn deliver(&self, balances: &[AssetBalance]) {
        let subscribers: Vec<Rc<dyn BalanceSubscriber>> = self.subscribers.borrow().clone();
        debug!("Delivering {} balances to {} subscribers", balances.len(), subscribers.len());

        for subscriber in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_balances(balances))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("⚠️ Balance subscriber failed: {:#}", e),
                Err(_) => error!("❌ Balance subscriber panicked"),
            }
        }
    }
}

/// Event handler bound to one connection generation
struct ConnectionEvents {
    generation: u64,
    shared: Weak<StreamShared>,
}

impl ConnectionEvents {
    fn current(&self) -> Option<Rc<StreamShared>> {
        let shared = self.shared.upgrade()?;
        if shared.is_current(self.generation) {
            Some(shared)
        } else {
            None
        }
    }
}

impl StreamEvents for ConnectionEvents {
    fn on_message(&self, text: &str) {
        let Some(shared) = self.current() else {
            debug!("Dropping message from retired connection #{}", self.generation);
            return;
        };

        match parse_stream_message(text) {
            Ok(StreamMessage::Event(UserStreamEvent::AccountPosition(event))) => {
                let balances = filter_non_zero_balances(event.balances);
                shared.deliver(&balances);
            }
            Ok(StreamMessage::Event(UserStreamEvent::Other)) => {
                debug!("Ignoring user stream event");
            }
            Ok(StreamMessage::NonEvent(value)) => {
                debug!("Ignoring non-event stream message: {}", value);
            }
            Err(e) => warn!("⚠️ Discarding malformed stream message: {}", e),
        }
    }

    fn on_close(&self) {
        if self.current().is_some() {
            warn!("🔌 Balance stream #{} closed by transport", self.generation);
        } else {
            debug!("Retired balance stream #{} closed", self.generation);
        }
    }

    fn on_error(&self, error: &str) {
        if self.current().is_some() {
            warn!("⚠️ Balance stream #{} error: {}", self.generation, error);
        } else {
            debug!("Retired balance stream #{} error: {}", self.generation, error);
        }
    }
}

/// Balance snapshots plus a multiplexed update subscription
pub struct BalanceManager {
    account: Rc<dyn AccountProvider>,
    transport: Rc<dyn StreamingTransport>,
    credentials: BinanceCredentials,
    config: BalanceStreamConfig,
    shared: Rc<StreamShared>,
}

impl BalanceManager {
    pub fn new(
        account: Rc<dyn AccountProvider>,
        transport: Rc<dyn StreamingTransport>,
        credentials: BinanceCredentials,
        config: BalanceStreamConfig,
    ) -> Self {
        Self {
            account,
            transport,
            credentials,
            config,
            shared: Rc::new(StreamShared::new()),
        }
    }

    /// Current non-zero balances, in provider order
    pub async fn get_balances(&self) -> Result<Vec<AssetBalance>> {
        let timer = PerfTimer::start("account snapshot");
        let result = self.account.fetch_account_balances().await;
        timer.log_elapsed();

        match result {
            Ok(balances) => Ok(filter_non_zero_balances(balances)),
            Err(e) => {
                log_error!("Account balance snapshot", e);
                Err(ExchangeError::BalanceFetchFailed)
            }
        }
    }

    /// Register `subscriber`, opening the shared stream if none is up
    pub async fn subscribe_to_balance_updates(&self, subscriber: Rc<dyn BalanceSubscriber>) -> Result<()> {
        if self.shared.insert(&subscriber) {
            debug!("Balance subscriber added ({} total)", self.subscriber_count());
        }

        match self.shared.state.get() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Opening => self.join_opening().await,
            ConnectionState::Closed | ConnectionState::Closing => self.open_stream(&subscriber).await,
        }
    }

    /// Remove `subscriber`; the stream is closed once nobody is left
    pub async fn unsubscribe_from_balance_updates(&self, subscriber: &Rc<dyn BalanceSubscriber>) {
        if !self.shared.remove(subscriber) {
            return;
        }
        debug!("Balance subscriber removed ({} left)", self.subscriber_count());

        if self.shared.has_subscribers() {
            return;
        }

        match self.shared.state.get() {
            ConnectionState::Open => {
                let connection = self.shared.connection.borrow_mut().take();
                self.close_stream(connection).await;
            }
            // The opener closes the stream once it sees the empty set
            ConnectionState::Opening => debug!("Last subscriber left while the stream is opening"),
            ConnectionState::Closed | ConnectionState::Closing => {}
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.borrow().len()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    async fn join_opening(&self) -> Result<()> {
        let pending = self.shared.pending_open.borrow().clone();
        match pending {
            Some(outcome) => {
                debug!("Waiting for balance stream #{} to open", self.shared.generation.get());
                outcome.wait().await
            }
            None => Ok(()),
        }
    }

    async fn open_stream(&self, subscriber: &Rc<dyn BalanceSubscriber>) -> Result<()> {
        if let Err(e) = self.credentials.ensure_valid() {
            self.shared.remove(subscriber);
            warn!("⚠️ Not opening balance stream: {}", e);
            return Err(e);
        }

        let generation = self.shared.generation.get() + 1;
        self.shared.generation.set(generation);
        self.shared.state.set(ConnectionState::Opening);
        let outcome = Rc::new(OpenOutcome::default());
        *self.shared.pending_open.borrow_mut() = Some(Rc::clone(&outcome));
        info!(
            "🔗 Opening balance stream #{} for API key {}",
            generation,
            self.credentials.masked_api_key()
        );

        let result = self.establish(generation).await;

        if self.shared.generation.get() == generation {
            self.shared.pending_open.borrow_mut().take();
        }
        outcome.settle(result.clone());
        result
    }

    /// Open the transport and send the account subscribe request
    async fn establish(&self, generation: u64) -> Result<()> {
        let events: Rc<dyn StreamEvents> = Rc::new(ConnectionEvents {
            generation,
            shared: Rc::downgrade(&self.shared),
        });

        let timer = PerfTimer::start("balance stream open");
        let opened = self.transport.open(&self.credentials, events).await;
        timer.log_elapsed();

        let connection = match opened {
            Ok(connection) => connection,
            Err(e) => {
                if self.shared.generation.get() == generation {
                    self.shared.subscribers.borrow_mut().clear();
                    self.shared.state.set(ConnectionState::Closed);
                }
                warn!("⚠️ Balance stream #{} failed to open: {}", generation, e);
                return Err(match e {
                    ExchangeError::ConnectionFailed(_) => e,
                    other => ExchangeError::ConnectionFailed(other.to_string()),
                });
            }
        };

        if !self.shared.has_subscribers() {
            info!("Balance stream #{} opened with nobody left to serve", generation);
            self.close_stream(Some(connection)).await;
            return Ok(());
        }

        *self.shared.connection.borrow_mut() = Some(Rc::clone(&connection));

        if let Err(e) = connection.send_account_subscribe_request(self.config.recv_window_ms).await {
            warn!("⚠️ Account subscribe request on stream #{} failed: {}", generation, e);
            self.shared.subscribers.borrow_mut().clear();
            let connection = self.shared.connection.borrow_mut().take();
            self.close_stream(connection).await;
            return Err(ExchangeError::ConnectionFailed(e.to_string()));
        }

        if !self.shared.has_subscribers() {
            info!("Balance stream #{} lost its last subscriber while subscribing", generation);
            let connection = self.shared.connection.borrow_mut().take();
            self.close_stream(connection).await;
            return Ok(());
        }

        self.shared.state.set(ConnectionState::Open);
        info!("✅ Balance stream #{} open", generation);
        Ok(())
    }

    async fn close_stream(&self, connection: Option<Rc<dyn StreamConnection>>) {
        let generation = self.shared.generation.get();
        self.shared.state.set(ConnectionState::Closing);

        if let Some(connection) = connection {
            if let Err(e) = connection.disconnect().await {
                warn!("⚠️ Balance stream #{} disconnect failed: {}", generation, e);
            }
        }

        // A new subscriber may have started another stream meanwhile
        if self.shared.generation.get() == generation && self.shared.state.get() == ConnectionState::Closing {
            self.shared.state.set(ConnectionState::Closed);
        }
        info!("🔌 Balance stream #{} closed", generation);
    }
}
