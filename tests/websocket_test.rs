// End-to-end tests for the /ws real-time channel
//
// Runs the full router on an ephemeral port and connects real WebSocket
// clients, since oneshot requests cannot complete an upgrade.

use futures::{SinkExt, StreamExt};
use sensor_hub::api::create_app;
use sensor_hub::gateway::RecordGateway;
use sensor_hub::notifier::ChangeNotifier;
use sensor_hub::record::RecordPayload;
use sensor_hub::store::RecordStore;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (SocketAddr, Arc<RecordGateway>) {
    let store = Arc::new(RecordStore::connect(":memory:").unwrap());
    let gateway = Arc::new(RecordGateway::new(store, Arc::new(ChangeNotifier::new())));
    let app = create_app(Arc::clone(&gateway));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, gateway)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

/// The server registers a subscriber after the upgrade completes; wait for it.
async fn wait_for_subscribers(gateway: &RecordGateway, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.notifier().subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscribers did not register in time");
}

async fn next_event(client: &mut Client) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(msg)) if msg.is_text() => return msg,
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {:?}", other),
            }
        }
    })
    .await
    .expect("no event received in time");

    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_new_reading_is_stored_and_broadcast_to_all() {
    let (addr, gateway) = start_server().await;
    let mut sender = connect(addr).await;
    let mut observer = connect(addr).await;
    wait_for_subscribers(&gateway, 2).await;

    let frame = json!({
        "event": "new-reading",
        "data": {"tipo": "sensor", "nombre": "Temp1", "valor": 21.5, "unidad": "C"}
    });
    sender
        .send(Message::text(frame.to_string()))
        .await
        .unwrap();

    for client in [&mut sender, &mut observer] {
        let event = next_event(client).await;
        assert_eq!(event["event"], json!("record-saved"));
        assert_eq!(event["data"]["nombre"], json!("Temp1"));
        assert!(event["data"]["_id"].is_string());
    }

    let stored = gateway.list_partitioned().unwrap();
    assert_eq!(stored.sensors.len(), 1);
    assert_eq!(stored.sensors[0].name.as_deref(), Some("Temp1"));
}

#[tokio::test]
async fn test_gateway_writes_reach_connected_clients() {
    let (addr, gateway) = start_server().await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&gateway, 1).await;

    let created = gateway
        .create(RecordPayload {
            kind: Some(Some("actuador".to_string())),
            name: Some(Some("Relay".to_string())),
            ..Default::default()
        })
        .unwrap();
    gateway.delete(&created.id).unwrap();

    let saved = next_event(&mut client).await;
    assert_eq!(saved["event"], json!("record-saved"));
    assert_eq!(saved["data"]["_id"], json!(created.id));

    let deleted = next_event(&mut client).await;
    assert_eq!(deleted["event"], json!("record-deleted"));
    assert_eq!(deleted["data"]["_id"], json!(created.id));
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let (addr, gateway) = start_server().await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&gateway, 1).await;

    client.send(Message::text("not json")).await.unwrap();
    client
        .send(Message::text(json!({"event": "unknown", "data": {}}).to_string()))
        .await
        .unwrap();

    // Connection survives and still receives broadcasts
    client
        .send(Message::text(
            json!({"event": "new-reading", "data": {"nombre": "After"}}).to_string(),
        ))
        .await
        .unwrap();

    let event = next_event(&mut client).await;
    assert_eq!(event["data"]["nombre"], json!("After"));
    assert_eq!(gateway.notifier().subscriber_count(), 1);
}

#[tokio::test]
async fn test_disconnect_unregisters_subscriber() {
    let (addr, gateway) = start_server().await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&gateway, 1).await;

    client.close(None).await.unwrap();
    wait_for_subscribers(&gateway, 0).await;
}
