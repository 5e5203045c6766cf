//! # Layered Backpressure
//!
//! The two drop points are independent and tested independently:
//!
//! - **Global**: publish queue full. The event reaches nobody, not even history.
//! - **Per client**: one client's queue full. Only that client has a gap.
//!
//! These tests run on the current-thread runtime, so the dispatch task only
//! runs when the test yields. Synchronous `publish_event` bursts therefore
//! fill the publish queue deterministically.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use event_broker::{BrokerConfig, Client, ClientQueue};
    use shared_types::{ClientMetadata, SubscriptionFilter};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn client(id: &str, filter: SubscriptionFilter, capacity: usize) -> (Arc<Client>, ClientQueue) {
        let (client, queue) = Client::new(id, filter, capacity, ClientMetadata::default());
        (Arc::new(client), queue)
    }

    #[tokio::test]
    async fn test_global_queue_drop_reaches_nobody() {
        let broker = start_broker_with(
            BrokerConfig::new(10, Duration::ZERO, 10).with_publish_queue_capacity(1),
        );
        let (a, mut queue) = client("a", SubscriptionFilter::all(), 10);
        broker.register_client(Arc::clone(&a)).unwrap();

        broker.publish_event(event("e1", "blog.post.created", "blog"));
        broker.publish_event(event("e2", "blog.post.created", "blog"));
        broker.publish_event(event("e3", "blog.post.created", "blog"));

        let stats = broker.stats();
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.events_dropped, 2);

        let first = timeout(WAIT, queue.recv()).await.expect("timeout").unwrap();
        assert_eq!(first.id, "e1");
        assert_eq!(broker.history().len(), 1);

        // Client side saw no loss of its own.
        assert_eq!(a.dropped_count(), 0);

        // Queue has room again.
        broker.publish_event(event("e4", "blog.post.created", "blog"));
        let next = timeout(WAIT, queue.recv()).await.expect("timeout").unwrap();
        assert_eq!(next.id, "e4");

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_slow_client_does_not_affect_others() {
        let broker = start_broker(10, 10);
        let (fast, mut fast_queue) = client("fast", SubscriptionFilter::all(), 10);
        let (slow, mut slow_queue) = client("slow", SubscriptionFilter::all(), 1);
        broker.register_client(Arc::clone(&fast)).unwrap();
        broker.register_client(Arc::clone(&slow)).unwrap();

        for id in ["e1", "e2", "e3"] {
            broker.publish_event(event(id, "blog.post.created", "blog"));
        }
        wait_for_event(&broker, "e3").await;

        assert_eq!(fast.delivered_count(), 3);
        assert_eq!(fast.dropped_count(), 0);
        assert_eq!(slow.delivered_count(), 1);
        assert_eq!(slow.dropped_count(), 2);
        assert_eq!(broker.stats().events_dropped, 0);

        for expected in ["e1", "e2", "e3"] {
            let got = timeout(WAIT, fast_queue.recv()).await.expect("timeout").unwrap();
            assert_eq!(got.id, expected);
        }

        // The slow client keeps e1, misses e2 and e3, then recovers.
        assert_eq!(slow_queue.try_recv().unwrap().id, "e1");
        broker.publish_event(event("e4", "blog.post.created", "blog"));
        let got = timeout(WAIT, slow_queue.recv()).await.expect("timeout").unwrap();
        assert_eq!(got.id, "e4");
        let got = timeout(WAIT, fast_queue.recv()).await.expect("timeout").unwrap();
        assert_eq!(got.id, "e4");

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_filtered_out_events_are_not_drops() {
        let broker = start_broker(10, 10);
        let (blog, _queue) = client("blog", SubscriptionFilter::event_types(["blog.*"]), 1);
        broker.register_client(Arc::clone(&blog)).unwrap();

        broker.publish_event(event("e1", "twitchbot.message.received", "twitchbot"));
        broker.publish_event(event("e2", "twitchbot.message.received", "twitchbot"));
        wait_for_event(&broker, "e2").await;

        assert_eq!(blog.delivered_count(), 0);
        assert_eq!(blog.dropped_count(), 0);

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_heartbeats_bypass_filters_and_history() {
        let broker = start_broker_with(BrokerConfig::new(10, Duration::from_millis(20), 10));
        let (blog, mut queue) = client("blog", SubscriptionFilter::event_types(["blog.*"]), 4);
        broker.register_client(Arc::clone(&blog)).unwrap();

        let heartbeat = timeout(WAIT, queue.recv()).await.expect("timeout").unwrap();
        assert!(heartbeat.is_heartbeat());
        assert_eq!(heartbeat.source, "broker");

        assert!(broker.history().is_empty());
        assert_eq!(broker.stats().events_published, 0);

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_client_queues() {
        let broker = start_broker(10, 10);
        let (a, mut queue) = client("a", SubscriptionFilter::all(), 4);
        broker.register_client(Arc::clone(&a)).unwrap();

        broker.publish_event(event("e1", "blog.post.created", "blog"));
        wait_for_event(&broker, "e1").await;
        broker.stop().await;

        assert!(a.is_closed());
        assert_eq!(broker.client_count(), 0);
        // Queued work drains, then the stream ends.
        assert_eq!(queue.recv().await.unwrap().id, "e1");
        assert!(timeout(WAIT, queue.recv()).await.expect("timeout").is_none());

        // Publishing after stop is silently dropped.
        broker.publish_event(event("e2", "blog.post.created", "blog"));
        assert_eq!(broker.history().len(), 1);
    }
}
