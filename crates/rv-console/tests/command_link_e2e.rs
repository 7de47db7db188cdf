use futures_util::SinkExt;
use rv_console::{
    CommandLink, CommandLinkClient, ConnectionState, LinkConfig, LinkEvent, ReconnectPolicy,
};
use rv_core::{Message, ServerFrame};
use rv_hub::{router, HubConfig, HubState};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use url::Url;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_hub() -> (SocketAddr, Arc<HubState>) {
    let hub = Arc::new(HubState::new(HubConfig::default()));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = router(hub.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, hub)
}

fn link_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("ws://{addr}/api/v1/ws/command-link")).expect("url")
}

async fn next_event(events: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("event before timeout")
        .expect("driver still running")
}

fn history_of(event: LinkEvent) -> Vec<Message> {
    match event {
        LinkEvent::Frame(ServerFrame::History { messages }) => messages,
        other => panic!("expected history, got {other:?}"),
    }
}

fn feedback_of(event: LinkEvent) -> Message {
    match event {
        LinkEvent::Frame(ServerFrame::Feedback(message)) => message,
        other => panic!("expected feedback, got {other:?}"),
    }
}

#[tokio::test]
async fn console_sees_history_then_live_feedback() {
    let (addr, hub) = spawn_hub().await;
    hub.store().accept("SYSTEM", "Sentinel online").await;

    let (mut client, mut events) = CommandLinkClient::spawn(LinkConfig::new(link_url(addr)));
    let mut link = CommandLink::new("Field-Unit-01");

    let event = next_event(&mut events).await;
    assert_eq!(event, LinkEvent::Connecting);
    link.apply(event);

    let event = next_event(&mut events).await;
    let history = history_of(event.clone());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "Sentinel online");
    link.apply(event);
    assert_eq!(link.state(), ConnectionState::Open);

    link.set_input("pothole at Allen Avenue");
    let frame = link.submit().expect("open link submits");
    client.submit(frame).expect("queued");

    let event = next_event(&mut events).await;
    let echoed = feedback_of(event.clone());
    assert_eq!(echoed.user, "Field-Unit-01");
    assert_eq!(echoed.message, "pothole at Allen Avenue");
    link.apply(event);

    hub.store().accept("SYSTEM", "Repair unit dispatched").await;
    let event = next_event(&mut events).await;
    link.apply(event);

    let texts: Vec<_> = link.messages().iter().map(|m| m.message.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Sentinel online",
            "pothole at Allen Avenue",
            "Repair unit dispatched"
        ]
    );

    client.close().await;
    assert_eq!(next_event(&mut events).await, LinkEvent::Closed);
}

#[tokio::test]
async fn feedback_fans_out_to_every_console() {
    let (addr, _hub) = spawn_hub().await;
    let (first, mut first_events) = CommandLinkClient::spawn(LinkConfig::new(link_url(addr)));
    let (_second, mut second_events) = CommandLinkClient::spawn(LinkConfig::new(link_url(addr)));

    for events in [&mut first_events, &mut second_events] {
        assert_eq!(next_event(events).await, LinkEvent::Connecting);
        assert!(history_of(next_event(events).await).is_empty());
    }

    first
        .submit(rv_core::ClientFrame::message("Field-Unit-01", "bridge joint cracked"))
        .expect("queued");

    let seen_by_first = feedback_of(next_event(&mut first_events).await);
    let seen_by_second = feedback_of(next_event(&mut second_events).await);
    assert_eq!(seen_by_first, seen_by_second);
    assert_eq!(seen_by_first.message, "bridge joint cracked");
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut config = LinkConfig::new(link_url(addr));
    config.reconnect = ReconnectPolicy {
        initial_delay: Duration::from_millis(10),
        max_attempts: Some(1),
        ..ReconnectPolicy::default()
    };
    let (_client, mut events) = CommandLinkClient::spawn(config);

    assert_eq!(next_event(&mut events).await, LinkEvent::Connecting);
    assert_eq!(
        next_event(&mut events).await,
        LinkEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(10),
        }
    );
    assert_eq!(next_event(&mut events).await, LinkEvent::Connecting);
    assert_eq!(next_event(&mut events).await, LinkEvent::Closed);
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn dropped_session_reconnects_with_fresh_history() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let histories = [
            r#"{"type":"history","messages":[{"id":"1","user":"SYSTEM","message":"first session","timestamp":"2026-02-07T21:00:00+00:00"}]}"#,
            r#"{"type":"history","messages":[{"id":"2","user":"SYSTEM","message":"second session","timestamp":"2026-02-07T21:00:05+00:00"}]}"#,
        ];
        let mut sessions = Vec::new();
        for (index, history) in histories.into_iter().enumerate() {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            ws.send(WsMessage::Text(history.to_string()))
                .await
                .expect("send history");
            if index == 0 {
                let _ = ws.close(None).await;
            } else {
                sessions.push(ws);
            }
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(sessions);
    });

    let mut config = LinkConfig::new(link_url(addr));
    config.reconnect.initial_delay = Duration::from_millis(10);
    let (_client, mut events) = CommandLinkClient::spawn(config);
    let mut link = CommandLink::new("Field-Unit-01");

    for _ in 0..2 {
        link.apply(next_event(&mut events).await);
    }
    assert_eq!(link.messages()[0].message, "first session");

    let event = next_event(&mut events).await;
    assert!(matches!(event, LinkEvent::Reconnecting { attempt: 1, .. }));
    link.apply(event);
    assert_eq!(link.state().label(), "RECONNECTING (1)");

    link.apply(next_event(&mut events).await);
    assert!(link.messages().is_empty());
    link.apply(next_event(&mut events).await);

    assert_eq!(link.state(), ConnectionState::Open);
    let texts: Vec<_> = link.messages().iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, vec!["second session"]);
}
