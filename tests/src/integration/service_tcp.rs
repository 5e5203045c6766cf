//! # Real Sockets
//!
//! Starts the full service on ephemeral loopback ports and talks raw
//! HTTP/1.1 over TCP, so framing, headers and shutdown are observed the way a
//! browser or `curl -N` would see them.

#[cfg(test)]
mod tests {
    use crate::support::WAIT;
    use push_gateway::{GatewayConfig, PushGatewayService};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    fn loopback_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.http.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.http.port = 0;
        config.admin.port = 0;
        config.broker.heartbeat_interval = Duration::ZERO;
        config
    }

    /// Read until `needle` has been seen, returning everything read so far.
    async fn read_until(stream: &mut TcpStream, seen: &mut String, needle: &str) {
        let mut buf = [0u8; 4096];
        while !seen.contains(needle) {
            let n = timeout(WAIT, stream.read(&mut buf))
                .await
                .expect("timeout")
                .expect("read");
            assert!(n > 0, "connection closed before {needle:?}; got {seen:?}");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }

    async fn open_events(addr: SocketAddr, query: &str) -> (TcpStream, String) {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let request = format!(
            "GET /events{query} HTTP/1.1\r\nHost: {addr}\r\nAccept: text/event-stream\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.expect("write");

        let mut seen = String::new();
        read_until(&mut stream, &mut seen, "connection.established").await;
        (stream, seen)
    }

    async fn post_events(addr: SocketAddr, body: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let request = format!(
            "POST /api/v1/events HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.expect("write");

        let mut response = String::new();
        timeout(WAIT, stream.read_to_string(&mut response))
            .await
            .expect("timeout")
            .expect("read");
        response
    }

    #[tokio::test]
    async fn test_stream_over_tcp() {
        let mut service = PushGatewayService::new(loopback_config()).unwrap();
        let addrs = service.start().await.unwrap();
        let admin = addrs.admin.expect("admin enabled");

        let (mut stream, mut seen) = open_events(addrs.http, "?event_types=blog.*").await;
        let head = seen.clone();
        let lower = head.to_ascii_lowercase();
        assert!(lower.starts_with("http/1.1 200"));
        assert!(lower.contains("content-type: text/event-stream"));
        assert!(lower.contains("cache-control: no-cache"));
        assert!(lower.contains("x-accel-buffering: no"));
        assert_eq!(service.broker().client_count(), 1);

        let response = post_events(
            admin,
            r#"[{"type":"blog.post.created","source":"blog","data":{"event_id":"tcp-1","title":"hi"}},
                {"type":"twitchbot.message.received","source":"twitchbot","data":{"event_id":"tcp-2"}}]"#,
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 202"), "{response}");
        assert!(response.contains(r#""accepted":2"#), "{response}");

        read_until(&mut stream, &mut seen, r#""title":"hi""#).await;
        assert!(seen.contains("id: tcp-1"), "{seen}");
        assert!(seen.contains("event: blog.post.created"), "{seen}");
        assert!(seen.contains(r#""title":"hi""#), "{seen}");
        assert!(!seen.contains("tcp-2"));

        timeout(WAIT, service.shutdown()).await.expect("timeout");

        // Stream ends: either the terminating chunk or EOF.
        let mut rest = String::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = timeout(WAIT, stream.read(&mut buf))
                .await
                .expect("timeout")
                .unwrap_or(0);
            if n == 0 {
                break;
            }
            rest.push_str(&String::from_utf8_lossy(&buf[..n]));
            if rest.contains("0\r\n\r\n") {
                break;
            }
        }
        assert!(!rest.contains("tcp-2"));
    }

    /// A subscriber that hangs up without any traffic for it is noticed on
    /// the next heartbeat write and unregistered.
    #[tokio::test]
    async fn test_hangup_detected_on_next_heartbeat() {
        let mut config = loopback_config();
        config.broker.heartbeat_interval = Duration::from_millis(50);
        let mut service = PushGatewayService::new(config).unwrap();
        let addrs = service.start().await.unwrap();
        let broker = service.broker();

        let (stream, _) = open_events(addrs.http, "?event_types=none.*").await;
        assert_eq!(broker.client_count(), 1);
        drop(stream);

        timeout(WAIT, async {
            while broker.client_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client still registered after hangup");

        timeout(WAIT, service.shutdown()).await.expect("timeout");
    }

    #[tokio::test]
    async fn test_cap_rejects_with_json_over_tcp() {
        let mut config = loopback_config();
        config.broker.max_clients = 1;
        let mut service = PushGatewayService::new(config).unwrap();
        let addrs = service.start().await.unwrap();

        let (_held, _) = open_events(addrs.http, "").await;

        let mut stream = TcpStream::connect(addrs.http).await.expect("connect");
        let request = format!(
            "GET /events HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            addrs.http
        );
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut response = String::new();
        timeout(WAIT, stream.read_to_string(&mut response))
            .await
            .expect("timeout")
            .expect("read");

        assert!(response.starts_with("HTTP/1.1 503"), "{response}");
        assert!(response.contains("client_limit_reached"), "{response}");
        assert_eq!(service.broker().client_count(), 1);

        timeout(WAIT, service.shutdown()).await.expect("timeout");
    }

    #[tokio::test]
    async fn test_admin_health_over_tcp() {
        let mut service = PushGatewayService::new(loopback_config()).unwrap();
        let addrs = service.start().await.unwrap();
        let admin = addrs.admin.expect("admin enabled");

        let mut stream = TcpStream::connect(admin).await.expect("connect");
        let request = format!("GET /health HTTP/1.1\r\nHost: {admin}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut response = String::new();
        timeout(WAIT, stream.read_to_string(&mut response))
            .await
            .expect("timeout")
            .expect("read");

        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains(r#""state":"running""#), "{response}");

        timeout(WAIT, service.shutdown()).await.expect("timeout");
    }
}
