//! Balance manager scenarios: snapshots, connection sharing and fan-out

use crate::fixtures::account_position;
use rstest::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tradegate_exchanges::binance::{
    BalanceManager, BalanceStreamConfig, BalanceSubscriber, BinanceBalance, BinanceCredentials, ConnectionState,
};
use tradegate_exchanges::testing::{RecordingTransport, ScriptedAccountProvider};
use tradegate_exchanges::{AssetBalance, ExchangeError};

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct Harness {
    account: Rc<ScriptedAccountProvider>,
    transport: Rc<RecordingTransport>,
    manager: BalanceManager,
}

#[fixture]
fn harness() -> Harness {
    let account = Rc::new(ScriptedAccountProvider::new(vec![
        BinanceBalance::new("BTC", "1.0", "0.0"),
        BinanceBalance::new("ETH", "0.0", "0.0"),
        BinanceBalance::new("USDT", "100.0", "50.0"),
    ]));
    let transport = Rc::new(RecordingTransport::new());
    let manager = BalanceManager::new(
        account.clone(),
        transport.clone(),
        BinanceCredentials::new("test_api_key_0123456789", "test_secret_key_0123456789"),
        BalanceStreamConfig { recv_window_ms: 5000 },
    );
    Harness { account, transport, manager }
}

/// Subscriber counting deliveries and keeping the last payload
fn counting_subscriber() -> (Rc<Cell<usize>>, Rc<RefCell<Vec<AssetBalance>>>, Rc<dyn BalanceSubscriber>) {
    let count = Rc::new(Cell::new(0));
    let last = Rc::new(RefCell::new(Vec::new()));
    let (count_sink, last_sink) = (Rc::clone(&count), Rc::clone(&last));
    let subscriber: Rc<dyn BalanceSubscriber> = Rc::new(move |balances: &[AssetBalance]| -> anyhow::Result<()> {
        count_sink.set(count_sink.get() + 1);
        *last_sink.borrow_mut() = balances.to_vec();
        Ok(())
    });
    (count, last, subscriber)
}

// ============================================================================
// SNAPSHOT TESTS
// ============================================================================

#[cfg(test)]
mod snapshot_tests {
    use super::*;

    #[rstest]
    #[monoio::test]
    async fn test_snapshot_drops_zero_balances(harness: Harness) {
        let balances = harness.manager.get_balances().await.unwrap();
        assert_eq!(
            balances,
            vec![
                AssetBalance::new("BTC", "1.0", "0.0"),
                AssetBalance::new("USDT", "100.0", "50.0"),
            ]
        );
    }

    #[rstest]
    #[monoio::test]
    async fn test_snapshot_is_recomputed_each_call(harness: Harness) {
        harness.manager.get_balances().await.unwrap();
        harness.account.set_response(Ok(vec![BinanceBalance::new("BNB", "0", "2.5")]));

        let balances = harness.manager.get_balances().await.unwrap();
        assert_eq!(balances, vec![AssetBalance::new("BNB", "0", "2.5")]);
        assert_eq!(harness.account.calls(), 2);
    }

    #[rstest]
    #[monoio::test]
    async fn test_snapshot_failure_hides_cause(harness: Harness) {
        harness
            .account
            .set_response(Err(ExchangeError::HttpError(400, "Timestamp for this request is outside of the recvWindow".into())));

        let err = harness.manager.get_balances().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch account balances");
    }

    #[monoio::test]
    async fn test_failing_account_reports_generic_error() {
        let account = Rc::new(ScriptedAccountProvider::failing(ExchangeError::NetworkError(
            "api.binance.com: connection reset".into(),
        )));
        let manager = BalanceManager::new(
            account.clone(),
            Rc::new(RecordingTransport::new()),
            BinanceCredentials::new("test_api_key_0123456789", "test_secret_key_0123456789"),
            BalanceStreamConfig::default(),
        );

        assert_eq!(manager.get_balances().await.unwrap_err(), ExchangeError::BalanceFetchFailed);
        assert_eq!(account.calls(), 1);
    }

    #[rstest]
    #[case::free_only("0.5", "0.0", true)]
    #[case::locked_only("0.00000000", "0.00000001", true)]
    #[case::both_zero("0.00000000", "0.00000000", false)]
    #[case::negative("-1.0", "0", false)]
    #[case::garbage("abc", "", false)]
    #[case::integer_text("3", "0", true)]
    fn test_non_zero_rule(#[case] free: &str, #[case] locked: &str, #[case] kept: bool) {
        assert_eq!(BinanceBalance::new("BTC", free, locked).is_non_zero(), kept);
    }
}

// ============================================================================
// SUBSCRIPTION TESTS
// ============================================================================

#[cfg(test)]
mod subscription_tests {
    use super::*;

    #[rstest]
    #[monoio::test]
    async fn test_many_subscribers_share_one_connection(harness: Harness) {
        let subscribers: Vec<Rc<dyn BalanceSubscriber>> = (0..5).map(|_| counting_subscriber().2).collect();

        for subscriber in &subscribers {
            harness.manager.subscribe_to_balance_updates(subscriber.clone()).await.unwrap();
        }
        assert_eq!(harness.transport.open_count(), 1);
        assert_eq!(harness.manager.subscriber_count(), 5);

        for subscriber in &subscribers[..4] {
            harness.manager.unsubscribe_from_balance_updates(subscriber).await;
            assert_eq!(harness.transport.disconnect_count(), 0);
        }
        harness.manager.unsubscribe_from_balance_updates(&subscribers[4]).await;
        assert_eq!(harness.transport.disconnect_count(), 1);
        assert_eq!(harness.manager.connection_state(), ConnectionState::Closed);

        harness.manager.subscribe_to_balance_updates(subscribers[0].clone()).await.unwrap();
        assert_eq!(harness.transport.open_count(), 2);
        assert_eq!(harness.manager.connection_state(), ConnectionState::Open);
    }

    #[rstest]
    #[monoio::test]
    async fn test_open_sends_account_subscribe(harness: Harness) {
        let (_, _, subscriber) = counting_subscriber();
        harness.manager.subscribe_to_balance_updates(subscriber).await.unwrap();

        assert_eq!(harness.transport.subscribe_requests(), vec![5000]);
        let credentials = harness.transport.last_credentials().unwrap();
        assert!(credentials.api_key.starts_with("test_api_key"));
    }

    #[rstest]
    #[monoio::test]
    async fn test_update_reaches_every_subscriber(harness: Harness) {
        let (first_count, first_last, first) = counting_subscriber();
        let (second_count, _, second) = counting_subscriber();
        harness.manager.subscribe_to_balance_updates(first).await.unwrap();
        harness.manager.subscribe_to_balance_updates(second).await.unwrap();

        harness
            .transport
            .emit(&account_position(&[("BTC", "0.9", "0.1"), ("ETH", "0.0", "0.0"), ("BNB", "0", "1")]));

        assert_eq!(first_count.get(), 1);
        assert_eq!(second_count.get(), 1);
        assert_eq!(
            *first_last.borrow(),
            vec![AssetBalance::new("BTC", "0.9", "0.1"), AssetBalance::new("BNB", "0", "1")]
        );
    }

    #[rstest]
    #[monoio::test]
    async fn test_unsubscribed_stops_receiving(harness: Harness) {
        let (stay_count, _, stay) = counting_subscriber();
        let (leave_count, _, leave) = counting_subscriber();
        harness.manager.subscribe_to_balance_updates(stay).await.unwrap();
        harness.manager.subscribe_to_balance_updates(leave.clone()).await.unwrap();

        harness.manager.unsubscribe_from_balance_updates(&leave).await;
        harness.transport.emit(&account_position(&[("BTC", "1", "0")]));

        assert_eq!(stay_count.get(), 1);
        assert_eq!(leave_count.get(), 0);
    }

    #[rstest]
    #[monoio::test]
    async fn test_invalid_json_keeps_stream_open(harness: Harness) {
        let (count, _, subscriber) = counting_subscriber();
        harness.manager.subscribe_to_balance_updates(subscriber).await.unwrap();

        harness.transport.emit("invalid json");
        harness.transport.emit("{\"e\":");

        assert_eq!(count.get(), 0);
        assert_eq!(harness.manager.connection_state(), ConnectionState::Open);
        assert_eq!(harness.transport.disconnect_count(), 0);
    }

    #[rstest]
    #[monoio::test]
    async fn test_erroring_subscriber_does_not_block_others(harness: Harness) {
        let broken: Rc<dyn BalanceSubscriber> =
            Rc::new(|_: &[AssetBalance]| -> anyhow::Result<()> { Err(anyhow::anyhow!("downstream queue full")) });
        let (count, _, healthy) = counting_subscriber();
        harness.manager.subscribe_to_balance_updates(broken).await.unwrap();
        harness.manager.subscribe_to_balance_updates(healthy).await.unwrap();

        harness.transport.emit(&account_position(&[("USDT", "10", "0")]));
        assert_eq!(count.get(), 1);
    }

    #[monoio::test]
    async fn test_missing_credentials_is_configuration_error() {
        let transport = Rc::new(RecordingTransport::new());
        let manager = BalanceManager::new(
            Rc::new(ScriptedAccountProvider::new(Vec::new())),
            transport.clone(),
            BinanceCredentials::default(),
            BalanceStreamConfig::default(),
        );
        let (_, _, subscriber) = counting_subscriber();

        let err = manager.subscribe_to_balance_updates(subscriber).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ConfigurationError(_)));
        assert_eq!(manager.subscriber_count(), 0);
        assert_eq!(transport.open_attempts(), 0);
    }

    #[rstest]
    #[monoio::test]
    async fn test_open_failure_is_connection_failed(harness: Harness) {
        harness
            .transport
            .fail_next_open(ExchangeError::ConnectionFailed("stream.binance.com:9443 refused".into()));
        let (_, _, subscriber) = counting_subscriber();

        let err = harness.manager.subscribe_to_balance_updates(subscriber).await.unwrap_err();
        assert_eq!(err, ExchangeError::ConnectionFailed("stream.binance.com:9443 refused".into()));
        assert_eq!(harness.manager.subscriber_count(), 0);
        assert_eq!(harness.manager.connection_state(), ConnectionState::Closed);
    }
}
