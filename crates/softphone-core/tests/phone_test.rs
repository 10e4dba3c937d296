//! Phone facade: notifications, session-event subscription, queue pickup
//! and remote call control

mod common;

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use common::*;
use softphone_core::{
    CallHandle, CallState, ClientError, NotificationSink, PartyStatus, PhoneEvent, PhoneNumberRecord, SessionParty,
    SignalingEvent, SoftphoneBuilder, SoftphoneConfig, TelephonySessionEvent, SESSION_EVENTS_GATE,
};

const QUEUE_EXTENSION: &str = "62282928016";

fn queue_event(status: &str) -> TelephonySessionEvent {
    TelephonySessionEvent {
        telephony_session_id: Some("ts-1".to_string()),
        parties: vec![SessionParty {
            id: Some("p-1".to_string()),
            extension_id: Some(QUEUE_EXTENSION.to_string()),
            status: Some(PartyStatus {
                code: Some(status.to_string()),
            }),
        }],
    }
}

#[tokio::test]
async fn test_failed_outbound_call_notifies_once() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();
    let sink = Arc::new(RecordingSink::default());
    let phone = SoftphoneBuilder::new(client.clone(), api.clone())
        .notification_sink(sink.clone() as Arc<dyn NotificationSink>)
        .subscription_gate(fresh_gate())
        .build()
        .unwrap();
    phone.start().await.unwrap();
    let mut events = phone.subscribe_events();

    client.emit(SignalingEvent::OutboundCallCreated {
        call: CallHandle::new("s-1", "p-1"),
    });
    client.emit(SignalingEvent::CallFailed {
        session_id: "s-1".to_string(),
        reason: "486 Busy Here".to_string(),
    });
    client.emit(SignalingEvent::CallFailed {
        session_id: "s-1".to_string(),
        reason: "486 Busy Here".to_string(),
    });

    match wait_for_event(&mut events, |e| matches!(e, PhoneEvent::OutboundCallFailed { .. })).await {
        PhoneEvent::OutboundCallFailed { session_id, notification, .. } => {
            assert_eq!(session_id, "s-1");
            assert_eq!(notification.description, "486 Busy Here");
        }
        _ => unreachable!(),
    }
    settle().await;

    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].message, "Outbound call failed");
    assert_eq!(received[0].duration, Duration::from_secs(10));
}

#[tokio::test]
async fn test_dispose_stops_notifier() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();
    let sink = Arc::new(RecordingSink::default());
    let phone = SoftphoneBuilder::new(client.clone(), api.clone())
        .notification_sink(sink.clone() as Arc<dyn NotificationSink>)
        .subscription_gate(fresh_gate())
        .build()
        .unwrap();
    phone.start().await.unwrap();
    phone.dispose().await.unwrap();
    settle().await;

    client.emit(SignalingEvent::OutboundCallCreated {
        call: CallHandle::new("s-1", "p-1"),
    });
    client.emit(SignalingEvent::CallFailed {
        session_id: "s-1".to_string(),
        reason: "408 Request Timeout".to_string(),
    });
    settle().await;

    assert!(sink.received().is_empty());
}

#[tokio::test]
#[serial]
async fn test_relogin_subscribes_to_session_events_once() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();

    for _ in 0..2 {
        let phone = SoftphoneBuilder::new(client.clone(), api.clone()).build().unwrap();
        phone.start().await.unwrap();
        phone.dispose().await.unwrap();
    }

    assert_eq!(api.subscribe_calls(), 1);
    assert!(SESSION_EVENTS_GATE.is_claimed());
}

#[tokio::test]
async fn test_failed_subscription_is_not_retried() {
    let gate = fresh_gate();
    let api = MockSessionControlApi::new();
    api.set_fail_subscribe(true);

    for _ in 0..2 {
        let client = MockSignalingClient::new();
        let phone = SoftphoneBuilder::new(client.clone(), api.clone())
            .subscription_gate(gate)
            .build()
            .unwrap();
        // Subscription failure does not fail start
        phone.start().await.unwrap();
        assert_eq!(client.start_calls(), 1);
    }

    assert_eq!(api.subscribe_calls(), 1);
    assert!(gate.is_claimed());
}

#[tokio::test(start_paused = true)]
async fn test_queue_call_picked_up_after_delay() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();
    let phone = SoftphoneBuilder::new(client.clone(), api.clone())
        .config(
            SoftphoneConfig::new()
                .with_queue_pickup(QUEUE_EXTENSION)
                .with_device_id("dev-1"),
        )
        .subscription_gate(fresh_gate())
        .build()
        .unwrap();
    phone.start().await.unwrap();

    api.push_session_event(queue_event("Setup"));
    api.push_session_event(queue_event("Proceeding"));

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(api.pickups().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        api.pickups(),
        vec![("ts-1".to_string(), "p-1".to_string(), "dev-1".to_string())]
    );
}

#[tokio::test]
async fn test_queue_pickup_requires_device_id() {
    let err = SoftphoneBuilder::new(MockSignalingClient::new(), MockSessionControlApi::new())
        .config(SoftphoneConfig::new().with_queue_pickup(QUEUE_EXTENSION))
        .build()
        .unwrap_err();

    assert!(matches!(err, ClientError::MissingConfiguration { ref field } if field == "device_id"));
}

#[tokio::test]
async fn test_call_control_uses_device_id() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();
    let phone = SoftphoneBuilder::new(client.clone(), api.clone())
        .config(SoftphoneConfig::new().with_device_id("dev-7"))
        .subscription_gate(fresh_gate())
        .build()
        .unwrap();

    let ringing = session("in-1", CallState::Ringing);
    phone.call_control_answer(&ringing).await.unwrap();
    phone.call_out("16505550123").await.unwrap();

    assert_eq!(
        api.answers(),
        vec![("in-1".to_string(), "in-1-party".to_string(), "dev-7".to_string())]
    );
    assert_eq!(
        api.call_outs(),
        vec![("dev-7".to_string(), "16505550123".to_string())]
    );
}

#[tokio::test]
async fn test_call_control_without_device_id_fails() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();
    let phone = SoftphoneBuilder::new(client.clone(), api.clone())
        .subscription_gate(fresh_gate())
        .build()
        .unwrap();

    let err = phone.call_out("16505550123").await.unwrap_err();
    assert!(matches!(err, ClientError::MissingConfiguration { .. }));
    assert!(api.call_outs().is_empty());
}

#[tokio::test]
async fn test_outbound_calls_present_default_caller_id() {
    let client = MockSignalingClient::new();
    let api = MockSessionControlApi::new();
    let phone = SoftphoneBuilder::new(client.clone(), api.clone())
        .subscription_gate(fresh_gate())
        .build()
        .unwrap();

    phone.call("16505550123", None).await.unwrap();
    phone.set_phone_numbers(&[
        PhoneNumberRecord {
            phone_number: "+16505550100".to_string(),
            primary: true,
            features: vec!["CallerId".to_string()],
        },
        PhoneNumberRecord {
            phone_number: "+16505550101".to_string(),
            primary: false,
            features: vec!["CallerId".to_string()],
        },
    ]);
    phone.call("16505550123", None).await.unwrap();
    phone.call("16505550123", Some("16505550101")).await.unwrap();

    assert_eq!(
        client.calls(),
        vec![
            ("16505550123".to_string(), None),
            ("16505550123".to_string(), Some("16505550100".to_string())),
            ("16505550123".to_string(), Some("16505550101".to_string())),
        ]
    );
    assert_eq!(phone.caller_ids().len(), 2);
}
