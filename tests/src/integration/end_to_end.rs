//! # Subscribe, Replay and Filter
//!
//! Drives the stream router against a live broker:
//!
//! 1. History replay at connect time, filtered by the subscription
//! 2. Live delivery honouring the filter
//! 3. Reconnect with `Last-Event-ID`, including an id that aged out
//! 4. Admission cap surfaced as 503 without disturbing existing clients

#[cfg(test)]
mod tests {
    use crate::support::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use push_gateway::{translate, IngestMessage};
    use serde_json::json;

    /// Capacity 3, two clients max, no heartbeats.
    ///
    /// `e1` predates the connection and arrives as replay; `e2` arrives live;
    /// `e3` never arrives because the filter excludes it.
    #[tokio::test]
    async fn test_subscribe_replay_then_live_filtered() {
        let broker = start_broker(2, 3);
        let app = stream_app(&broker);

        broker.publish_event(event("e1", "blog.post.created", "blog"));
        wait_for_event(&broker, "e1").await;

        let mut c1 = open_stream(&app, "/events?event_types=blog.*", None).await;
        let greeting = c1.next().await;
        assert_eq!(greeting.event, "connection.established");
        assert_eq!(greeting.data["source"], "broker");
        let client_id = greeting.data["data"]["client_id"]
            .as_str()
            .expect("client id")
            .to_string();
        assert!(broker.is_registered(&client_id));

        let replay = c1.next().await;
        assert_eq!(replay.id, "e1");

        broker.publish_event(event("e2", "blog.post.created", "blog"));
        broker.publish_event(event("e3", "twitchbot.message.received", "twitchbot"));
        broker.publish_event(event("e4", "blog.comment.created", "blog"));

        let live = c1.next_n(2).await;
        assert_eq!(ids(&live), ["e2", "e4"]);
        assert_eq!(live[0].event, "blog.post.created");
        assert_eq!(live[0].data["type"], "blog.post.created");

        // History window holds the last three regardless of filters.
        let window: Vec<String> = broker.history().iter().map(|e| e.id.clone()).collect();
        assert_eq!(window, ["e2", "e3", "e4"]);

        broker.stop().await;
        assert!(c1.finish().await.is_empty());
    }

    #[tokio::test]
    async fn test_source_filter() {
        let broker = start_broker(10, 10);
        let app = stream_app(&broker);

        let mut reader = open_stream(&app, "/events?sources=twitchbot", None).await;
        reader.next().await;

        broker.publish_event(event("e1", "blog.post.created", "blog"));
        broker.publish_event(event("e2", "twitchbot.message.received", "twitchbot"));
        assert_eq!(reader.next().await.id, "e2");

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_reconnect_with_last_event_id() {
        let broker = start_broker(10, 3);
        let app = stream_app(&broker);

        for id in ["e1", "e2", "e3"] {
            broker.publish_event(event(id, "blog.post.created", "blog"));
        }
        wait_for_event(&broker, "e3").await;

        let mut resumed = open_stream(&app, "/events", Some("e1")).await;
        let frames = resumed.next_n(3).await;
        assert_eq!(frames[0].event, "connection.established");
        assert_eq!(ids(&frames[1..]), ["e2", "e3"]);

        // Push e1 out of the window, then resume from it.
        broker.publish_event(event("e4", "blog.post.created", "blog"));
        wait_for_event(&broker, "e4").await;

        let mut stale = open_stream(&app, "/events", Some("e1")).await;
        assert_eq!(stale.next().await.event, "connection.established");
        broker.publish_event(event("e5", "blog.post.created", "blog"));
        assert_eq!(stale.next().await.id, "e5");

        broker.stop().await;
    }

    /// An ingested id containing a line break is stored the way it is sent,
    /// so echoing the received id back as `Last-Event-ID` resumes correctly.
    #[tokio::test]
    async fn test_resume_from_id_as_received() {
        let broker = start_broker(10, 10);
        let app = stream_app(&broker);

        let first = translate(IngestMessage::new(
            "blog.post.created",
            "blog",
            json!({"id": "a\nb"}),
        ))
        .expect("translates");
        broker.publish_event(first);
        broker.publish_event(event("e2", "blog.post.created", "blog"));
        broker.publish_event(event("e3", "blog.post.created", "blog"));
        wait_for_event(&broker, "e3").await;

        let mut reader = open_stream(&app, "/events", None).await;
        let frames = reader.next_n(4).await;
        let received_id = frames[1].id.clone();
        assert_eq!(received_id, "ab");
        assert_eq!(frames[1].data["id"], "ab");

        let mut resumed = open_stream(&app, "/events", Some(&received_id)).await;
        let frames = resumed.next_n(3).await;
        assert_eq!(frames[0].event, "connection.established");
        assert_eq!(ids(&frames[1..]), ["e2", "e3"]);

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_admission_cap() {
        let broker = start_broker(2, 10);
        let app = stream_app(&broker);

        let mut first = open_stream(&app, "/events", None).await;
        let _second = open_stream(&app, "/events", None).await;
        assert_eq!(broker.client_count(), 2);

        let rejected = subscribe(&app, "/events", None).await;
        assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = rejected.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "client_limit_reached");
        assert_eq!(broker.client_count(), 2);

        // Existing clients are unaffected.
        first.next().await;
        broker.publish_event(event("e1", "blog.post.created", "blog"));
        assert_eq!(first.next().await.id, "e1");

        broker.stop().await;
    }

    #[tokio::test]
    async fn test_disconnect_frees_a_slot() {
        let broker = start_broker(1, 10);
        let app = stream_app(&broker);

        let first = open_stream(&app, "/events", None).await;
        assert_eq!(
            subscribe(&app, "/events", None).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        drop(first);
        assert_eq!(broker.client_count(), 0);

        let _again = open_stream(&app, "/events", None).await;
        assert_eq!(broker.client_count(), 1);

        broker.stop().await;
    }
}
