// tests/pipeline_scenarios.rs
//
// End-to-end scenarios through the public Pipeline API with an in-memory sink.

use std::sync::{Arc, Mutex};

use payment_signal_relay::{
    AccessibilityPayload, Direction, NotificationPayload, PaymentEvent, Pipeline, PipelineConfig,
    ProcessOutcome, Sink, SignalSource, SmsPayload,
};
use rust_decimal::Decimal;

const T0: i64 = 1_700_000_000_000;

#[derive(Default)]
struct Collect(Mutex<Vec<PaymentEvent>>);

impl Sink for Collect {
    fn deliver(&self, event: &PaymentEvent) -> bool {
        self.0.lock().unwrap().push(event.clone());
        true
    }
}

fn pipeline() -> (Pipeline, Arc<Collect>) {
    let sink = Arc::new(Collect::default());
    let p = Pipeline::new(&PipelineConfig::default(), sink.clone()).expect("pipeline");
    (p, sink)
}

fn delivered(sink: &Collect) -> Vec<PaymentEvent> {
    sink.0.lock().unwrap().clone()
}

#[test]
fn scenario_a_phonepe_credit_notification() {
    let (p, sink) = pipeline();
    let out = p.ingest(NotificationPayload {
        package_name: "com.phonepe.app".into(),
        title: Some("Money received".into()),
        text: Some("You received ₹500 from Raj".into()),
        big_text: None,
        post_time_ms: Some(T0),
    });
    assert_eq!(out, ProcessOutcome::Delivered);

    let events = delivered(&sink);
    assert_eq!(events.len(), 1);
    let e = &events[0];
    assert_eq!(e.source, SignalSource::Notification);
    assert_eq!(e.extracted_amount, Some(Decimal::new(50000, 2)));
    assert_eq!(e.currency_hint.as_deref(), Some("INR"));
    assert_eq!(e.direction_hint, Direction::Credited);
    assert_eq!(e.counterpart.as_deref(), Some("Raj"));
    assert_eq!(e.app_name.as_deref(), Some("PhonePe"));
    assert_eq!(e.raw_text, "You received ₹500 from Raj");
}

#[test]
fn scenario_b_unknown_app_is_rejected() {
    let (p, sink) = pipeline();
    let out = p.ingest(NotificationPayload {
        package_name: "com.example.chat".into(),
        text: Some("You received ₹500 from Raj".into()),
        post_time_ms: Some(T0),
        ..Default::default()
    });
    assert_eq!(out, ProcessOutcome::Rejected);
    assert!(delivered(&sink).is_empty());
    assert_eq!(p.dedup_len(), 0);
}

#[test]
fn scenario_c_bank_debit_sms() {
    let (p, sink) = pipeline();
    let out = p.ingest(SmsPayload {
        sender: "VM-HDFCBK".into(),
        body: "Rs.1200 debited from your account".into(),
        received_at_ms: Some(T0),
    });
    assert_eq!(out, ProcessOutcome::Delivered);

    let e = &delivered(&sink)[0];
    assert_eq!(e.source, SignalSource::SmsMessage);
    assert_eq!(e.extracted_amount, Some(Decimal::from(1200)));
    assert_eq!(e.currency_hint.as_deref(), Some("INR"));
    assert_eq!(e.direction_hint, Direction::Paid);
}

#[test]
fn scenario_d_notification_then_sms_emits_once() {
    let (p, sink) = pipeline();
    let first = p.ingest(NotificationPayload {
        package_name: "com.phonepe.app".into(),
        text: Some("You received ₹500 from Raj".into()),
        post_time_ms: Some(T0),
        ..Default::default()
    });
    let second = p.ingest(SmsPayload {
        sender: "AX-PHONPE".into(),
        body: "Rs 500 received in your a/c from Raj via UPI".into(),
        received_at_ms: Some(T0 + 2_000),
    });
    assert_eq!(first, ProcessOutcome::Delivered);
    assert_eq!(second, ProcessOutcome::Suppressed);
    assert_eq!(delivered(&sink).len(), 1);
    assert_eq!(delivered(&sink)[0].source, SignalSource::Notification);
}

#[test]
fn same_snapshot_on_notification_and_accessibility_emits_once() {
    let (p, sink) = pipeline();
    let text = "Paid ₹40 to Chai Point";
    assert_eq!(
        p.ingest(NotificationPayload {
            package_name: "net.one97.paytm".into(),
            text: Some(text.into()),
            post_time_ms: Some(T0),
            ..Default::default()
        }),
        ProcessOutcome::Delivered
    );
    assert_eq!(
        p.ingest(AccessibilityPayload {
            package_name: "net.one97.paytm".into(),
            texts: vec!["Paid ₹40".into(), "to Chai Point".into()],
            event_time_ms: Some(T0 + 500),
        }),
        ProcessOutcome::Suppressed
    );
    assert_eq!(delivered(&sink).len(), 1);
}

#[test]
fn repeat_after_window_is_delivered_again() {
    let (p, sink) = pipeline();
    let sms = |at: i64| SmsPayload {
        sender: "JM-PAYTMB".into(),
        body: "Rs 99 paid to Metro Card".into(),
        received_at_ms: Some(at),
    };
    assert_eq!(p.ingest(sms(T0)), ProcessOutcome::Delivered);
    assert_eq!(p.ingest(sms(T0 + 30_000)), ProcessOutcome::Suppressed);
    assert_eq!(p.ingest(sms(T0 + 61_000)), ProcessOutcome::Delivered);
    assert_eq!(delivered(&sink).len(), 2);
}

#[test]
fn malformed_payloads_never_reach_the_sink() {
    let (p, sink) = pipeline();
    assert_eq!(
        p.ingest(AccessibilityPayload {
            package_name: "com.phonepe.app".into(),
            texts: vec!["   ".into()],
            event_time_ms: None,
        }),
        ProcessOutcome::Malformed
    );
    assert_eq!(
        p.ingest(SmsPayload {
            sender: "  ".into(),
            body: "Rs 10 credited".into(),
            received_at_ms: None,
        }),
        ProcessOutcome::Malformed
    );
    assert!(delivered(&sink).is_empty());
}

#[test]
fn title_fills_in_missing_amount() {
    let (p, sink) = pipeline();
    let out = p.ingest(NotificationPayload {
        package_name: "com.google.android.apps.nbu.paisa.user".into(),
        title: Some("₹1,250.50 received".into()),
        text: Some("Tap to view details".into()),
        post_time_ms: Some(T0),
        ..Default::default()
    });
    assert_eq!(out, ProcessOutcome::Delivered);
    let e = &delivered(&sink)[0];
    assert_eq!(e.extracted_amount, Some(Decimal::new(125050, 2)));
    assert_eq!(e.app_name.as_deref(), Some("Google Pay"));
    // direction comes from the body only
    assert_eq!(e.direction_hint, Direction::Unknown);
}

fn phonepe(text: &str, at: i64) -> NotificationPayload {
    NotificationPayload {
        package_name: "com.phonepe.app".into(),
        text: Some(text.into()),
        post_time_ms: Some(at),
        ..Default::default()
    }
}

#[test]
fn same_amount_from_different_payers_is_delivered_twice() {
    let (p, sink) = pipeline();
    assert_eq!(
        p.ingest(phonepe("You received ₹500 from Raj", T0)),
        ProcessOutcome::Delivered
    );
    assert_eq!(
        p.ingest(phonepe("You received ₹500 from Asha", T0 + 5_000)),
        ProcessOutcome::Delivered
    );
    let payers: Vec<_> = delivered(&sink)
        .into_iter()
        .map(|e| e.counterpart.unwrap_or_default())
        .collect();
    assert_eq!(payers, vec!["Raj".to_string(), "Asha".to_string()]);
}

#[test]
fn ambiguous_direction_on_second_channel_still_collides() {
    let (p, sink) = pipeline();
    assert_eq!(
        p.ingest(phonepe("You received ₹500 from Raj", T0)),
        ProcessOutcome::Delivered
    );
    // both "credited" and "paid" → direction unknown, treated as compatible
    assert_eq!(
        p.ingest(SmsPayload {
            sender: "AX-PHONPE".into(),
            body: "Rs 500 credited to your a/c, paid by Raj via UPI".into(),
            received_at_ms: Some(T0 + 1_000),
        }),
        ProcessOutcome::Suppressed
    );
    assert_eq!(delivered(&sink).len(), 1);
}

#[test]
fn opposite_direction_for_same_amount_is_a_new_transaction() {
    let (p, sink) = pipeline();
    assert_eq!(
        p.ingest(phonepe("You received ₹500 from Raj", T0)),
        ProcessOutcome::Delivered
    );
    assert_eq!(
        p.ingest(phonepe("You paid ₹500 to Raj", T0 + 10_000)),
        ProcessOutcome::Delivered
    );
    let directions: Vec<_> = delivered(&sink).iter().map(|e| e.direction_hint).collect();
    assert_eq!(directions, vec![Direction::Credited, Direction::Paid]);
}

#[test]
fn oversized_dedup_window_does_not_panic() {
    let cfg = PipelineConfig::from_toml_str("[dedup]\nwindow_secs = 9300000000000000").unwrap();
    let sink = Arc::new(Collect::default());
    let p = Pipeline::new(&cfg, sink.clone()).unwrap();
    assert_eq!(
        p.ingest(phonepe("You received ₹500 from Raj", T0)),
        ProcessOutcome::Delivered
    );
    assert_eq!(
        p.ingest(phonepe("You received ₹500 from Raj", T0 + 3_600_000)),
        ProcessOutcome::Suppressed
    );
    assert_eq!(delivered(&sink).len(), 1);
}
