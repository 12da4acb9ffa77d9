use super::*;
use chrono::Utc;
use serde_json::json;

fn sample_record(name: &str) -> Record {
    Record {
        id: Uuid::now_v7().to_string(),
        kind: Some("sensor".to_string()),
        name: Some(name.to_string()),
        value: None,
        unit: None,
        timestamp: Utc::now(),
    }
}

#[test]
fn test_publish_reaches_every_subscriber() {
    let notifier = ChangeNotifier::new();
    let mut a = notifier.subscribe();
    let mut b = notifier.subscribe();

    let record = sample_record("Temp1");
    let delivered = notifier.publish(ChangeEvent::Saved(record.clone()));

    assert_eq!(delivered, 2);
    assert_eq!(a.events.try_recv().unwrap(), ChangeEvent::Saved(record.clone()));
    assert_eq!(b.events.try_recv().unwrap(), ChangeEvent::Saved(record));
}

#[test]
fn test_no_backlog_for_late_subscribers() {
    let notifier = ChangeNotifier::new();
    notifier.publish(ChangeEvent::Saved(sample_record("early")));

    let mut late = notifier.subscribe();
    assert!(late.events.try_recv().is_err());
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let notifier = ChangeNotifier::new();
    let sub = notifier.subscribe();
    assert_eq!(notifier.subscriber_count(), 1);

    notifier.unsubscribe(&sub.id);
    assert_eq!(notifier.subscriber_count(), 0);
    assert_eq!(notifier.publish(ChangeEvent::Deleted(sample_record("x"))), 0);
}

#[test]
fn test_closed_subscriber_is_pruned() {
    let notifier = ChangeNotifier::new();
    let dropped = notifier.subscribe();
    let mut kept = notifier.subscribe();
    drop(dropped);

    let delivered = notifier.publish(ChangeEvent::Updated(sample_record("Relay")));

    assert_eq!(delivered, 1);
    assert_eq!(notifier.subscriber_count(), 1);
    assert!(kept.events.try_recv().is_ok());
}

#[test]
fn test_full_subscriber_does_not_block_others() {
    let notifier = ChangeNotifier::new();
    let _stalled = notifier.subscribe();
    let mut active = notifier.subscribe();

    for i in 0..SUBSCRIBER_BUFFER + 10 {
        notifier.publish(ChangeEvent::Saved(sample_record(&format!("r{}", i))));
        // Keep the active subscriber drained
        assert!(active.events.try_recv().is_ok());
    }

    // Stalled subscriber stays registered; it just misses events
    assert_eq!(notifier.subscriber_count(), 2);
}

#[test]
fn test_event_wire_format() {
    let record = sample_record("Temp1");
    let value = serde_json::to_value(ChangeEvent::Deleted(record.clone())).unwrap();

    assert_eq!(value["event"], json!("record-deleted"));
    assert_eq!(value["data"]["_id"], json!(record.id));
    assert_eq!(value["data"]["nombre"], json!("Temp1"));
}
