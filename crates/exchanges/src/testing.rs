//! Scripted collaborators for driving the managers without a network
//!
//! Compiled for this crate's own tests and behind the `testing` feature for
//! the integration test crate.

use crate::binance::auth::BinanceCredentials;
use crate::binance::types::BinanceBalance;
use crate::errors::{ExchangeError, Result};
use crate::traits::{AccountProvider, MetadataProvider, StreamConnection, StreamEvents, StreamingTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Metadata provider that replays queued responses.
///
/// Once the queue is drained every call gets the fallback response.
pub struct ScriptedMetadataProvider {
    queue: RefCell<VecDeque<Result<Value>>>,
    fallback: RefCell<Result<Value>>,
    calls: Cell<usize>,
}

impl Default for ScriptedMetadataProvider {
    fn default() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            fallback: RefCell::new(Err(ExchangeError::ProviderError("no scripted response".to_string()))),
            calls: Cell::new(0),
        }
    }
}

impl ScriptedMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider answering every call with the same document
    pub fn always(document: Value) -> Self {
        let provider = Self::default();
        provider.set_fallback(Ok(document));
        provider
    }

    pub fn push_ok(&self, document: Value) -> &Self {
        self.queue.borrow_mut().push_back(Ok(document));
        self
    }

    pub fn push_err(&self, error: ExchangeError) -> &Self {
        self.queue.borrow_mut().push_back(Err(error));
        self
    }

    pub fn set_fallback(&self, response: Result<Value>) {
        *self.fallback.borrow_mut() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl MetadataProvider for ScriptedMetadataProvider {
    async fn fetch_exchange_metadata(&self) -> Result<Value> {
        self.calls.set(self.calls.get() + 1);
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(response) => response,
            None => self.fallback.borrow().clone(),
        }
    }
}

/// Account provider returning a fixed snapshot or error
pub struct ScriptedAccountProvider {
    response: RefCell<Result<Vec<BinanceBalance>>>,
    calls: Cell<usize>,
}

impl ScriptedAccountProvider {
    pub fn new(balances: Vec<BinanceBalance>) -> Self {
        Self {
            response: RefCell::new(Ok(balances)),
            calls: Cell::new(0),
        }
    }

    pub fn failing(error: ExchangeError) -> Self {
        Self {
            response: RefCell::new(Err(error)),
            calls: Cell::new(0),
        }
    }

    pub fn set_response(&self, response: Result<Vec<BinanceBalance>>) {
        *self.response.borrow_mut() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl AccountProvider for ScriptedAccountProvider {
    async fn fetch_account_balances(&self) -> Result<Vec<BinanceBalance>> {
        self.calls.set(self.calls.get() + 1);
        self.response.borrow().clone()
    }
}

/// One-shot latch a test releases to let a parked future continue
#[derive(Default)]
pub struct Gate {
    released: Cell<bool>,
    waiters: RefCell<Vec<Waker>>,
}

impl Gate {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn release(&self) {
        self.released.set(true);
        for waker in self.waiters.borrow_mut().drain(..) {
            waker.wake();
        }
    }

    pub fn wait(self: &Rc<Self>) -> GateWait {
        GateWait { gate: Rc::clone(self) }
    }
}

pub struct GateWait {
    gate: Rc<Gate>,
}

impl Future for GateWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.gate.released.get() {
            Poll::Ready(())
        } else {
            self.gate.waiters.borrow_mut().push(cx.waker().clone());
            Poll::Pending
        }
    }
}

/// Poll `future` exactly once, leaving it parked where it stopped
pub async fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    std::future::poll_fn(|cx| Poll::Ready(Pin::new(&mut *future).poll(cx))).await
}

#[derive(Default)]
struct TransportLog {
    disconnects: Cell<usize>,
    subscribe_requests: RefCell<Vec<u64>>,
    disconnect_gate: RefCell<Option<Rc<Gate>>>,
}

/// Connection handed out by [`RecordingTransport`]
pub struct RecordingConnection {
    log: Rc<TransportLog>,
    fail_subscribe: bool,
}

#[async_trait(?Send)]
impl StreamConnection for RecordingConnection {
    async fn send_account_subscribe_request(&self, recv_window_ms: u64) -> Result<()> {
        self.log.subscribe_requests.borrow_mut().push(recv_window_ms);
        if self.fail_subscribe {
            return Err(ExchangeError::NetworkError("subscribe request rejected".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.log.disconnects.set(self.log.disconnects.get() + 1);
        let gate = self.log.disconnect_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        Ok(())
    }
}

/// Streaming transport that records every open and lets tests push frames
#[derive(Default)]
pub struct RecordingTransport {
    log: Rc<TransportLog>,
    sessions: RefCell<Vec<Rc<dyn StreamEvents>>>,
    last_credentials: RefCell<Option<BinanceCredentials>>,
    fail_next_open: RefCell<Option<ExchangeError>>,
    fail_subscribe: Cell<bool>,
    open_gate: RefCell<Option<Rc<Gate>>>,
    open_attempts: Cell<usize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` call fail with `error`
    pub fn fail_next_open(&self, error: ExchangeError) {
        *self.fail_next_open.borrow_mut() = Some(error);
    }

    /// Make every subscribe request on connections opened from now on fail
    pub fn fail_subscribe_requests(&self, fail: bool) {
        self.fail_subscribe.set(fail);
    }

    /// Park every `open` call until `gate` is released
    pub fn hold_opens(&self, gate: Rc<Gate>) {
        *self.open_gate.borrow_mut() = Some(gate);
    }

    /// Park every `disconnect` call until `gate` is released.
    ///
    /// The disconnect is counted as soon as it starts.
    pub fn hold_disconnects(&self, gate: Rc<Gate>) {
        *self.log.disconnect_gate.borrow_mut() = Some(gate);
    }

    /// Successful opens
    pub fn open_count(&self) -> usize {
        self.sessions.borrow().len()
    }

    /// Every `open` call, including failed ones
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.get()
    }

    pub fn disconnect_count(&self) -> usize {
        self.log.disconnects.get()
    }

    pub fn subscribe_requests(&self) -> Vec<u64> {
        self.log.subscribe_requests.borrow().clone()
    }

    pub fn last_credentials(&self) -> Option<BinanceCredentials> {
        self.last_credentials.borrow().clone()
    }

    /// Deliver a text frame on the most recently opened connection
    pub fn emit(&self, text: &str) {
        let latest = self.sessions.borrow().last().cloned();
        if let Some(events) = latest {
            events.on_message(text);
        }
    }

    /// Deliver a text frame on the `index`-th connection ever opened
    pub fn emit_on(&self, index: usize, text: &str) {
        let events = self.sessions.borrow().get(index).cloned();
        if let Some(events) = events {
            events.on_message(text);
        }
    }

    pub fn close_latest(&self) {
        let latest = self.sessions.borrow().last().cloned();
        if let Some(events) = latest {
            events.on_close();
        }
    }

    pub fn error_latest(&self, error: &str) {
        let latest = self.sessions.borrow().last().cloned();
        if let Some(events) = latest {
            events.on_error(error);
        }
    }
}

#[async_trait(?Send)]
impl StreamingTransport for RecordingTransport {
    async fn open(
        &self,
        credentials: &BinanceCredentials,
        events: Rc<dyn StreamEvents>,
    ) -> Result<Rc<dyn StreamConnection>> {
        self.open_attempts.set(self.open_attempts.get() + 1);
        *self.last_credentials.borrow_mut() = Some(credentials.clone());

        let gate = self.open_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let failure = self.fail_next_open.borrow_mut().take();
        if let Some(error) = failure {
            return Err(error);
        }

        self.sessions.borrow_mut().push(events);
        Ok(Rc::new(RecordingConnection {
            log: Rc::clone(&self.log),
            fail_subscribe: self.fail_subscribe.get(),
        }))
    }
}
