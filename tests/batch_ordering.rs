//! Batch sequencing: delivery order, veto semantics, sandbox reuse, and
//! the teardown policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use domsnap::{CaptureOptions, Capturer, Document, Error, ResultAction};

fn three_pane_page() -> domsnap::DocumentHandle {
    Document::new(
        "<html><body>\
         <div id='one'><h1>First pane</h1></div>\
         <div id='two'><p>Second pane with some longer text to wrap.</p></div>\
         <div id='three'><p>Third</p><p>pane</p></div>\
         </body></html>",
    )
}

async fn solo_digest(doc: &domsnap::DocumentHandle, selector: &str) -> String {
    let mut capturer = Capturer::new();
    capturer
        .capture(&doc.select(selector), &CaptureOptions::default())
        .await
        .expect("solo capture failed")
        .digest()
}

#[tokio::test]
async fn results_are_delivered_in_input_order_with_no_gaps() {
    let doc = three_pane_page();
    let expected = [
        solo_digest(&doc, "#one").await,
        solo_digest(&doc, "#two").await,
        solo_digest(&doc, "#three").await,
    ];

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();

    let mut capturer = Capturer::new();
    capturer.on_result(move |result| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(result.digest());
        }
        ResultAction::Continue
    });

    let targets = vec![doc.select("#one"), doc.select("#two"), doc.select("#three")];
    let results = capturer
        .capture_all(&targets, &CaptureOptions::default())
        .await
        .expect("batch failed");

    assert_eq!(results.len(), 3);
    // The hook saw each position's pixels before the next paint overwrote
    // them, in exactly input order.
    let seen = delivered.lock().expect("poisoned").clone();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn the_whole_batch_shares_one_sandbox() {
    let doc = three_pane_page();
    let mut capturer = Capturer::new();
    capturer.on_result(|_| ResultAction::Continue);
    let targets = vec![doc.select("#one"), doc.select("#two"), doc.select("#three")];
    capturer
        .capture_all(&targets, &CaptureOptions::default())
        .await
        .expect("batch failed");
    assert_eq!(capturer.sandbox_creations(), 1);
}

#[tokio::test]
async fn veto_stops_remaining_targets() {
    let doc = three_pane_page();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_hook = calls.clone();

    let mut capturer = Capturer::new();
    capturer.on_result(move |_| {
        calls_in_hook.fetch_add(1, Ordering::SeqCst);
        ResultAction::Stop
    });

    let targets = vec![doc.select("#one"), doc.select("#two"), doc.select("#three")];
    let err = capturer
        .capture_all(&targets, &CaptureOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Vetoed(0)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(capturer.sandbox_creations(), 1);
}

#[tokio::test]
async fn veto_mid_batch_keeps_earlier_deliveries() {
    let doc = three_pane_page();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();

    let mut capturer = Capturer::new();
    capturer.on_result(move |result| {
        let mut seen = sink.lock().expect("poisoned");
        seen.push(result.digest());
        if seen.len() < 2 {
            ResultAction::Continue
        } else {
            ResultAction::Stop
        }
    });

    let targets = vec![doc.select("#one"), doc.select("#two"), doc.select("#three")];
    let err = capturer
        .capture_all(&targets, &CaptureOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Vetoed(1)));
    // Two deliveries happened and stand; the third target never started.
    assert_eq!(delivered.lock().expect("poisoned").len(), 2);
    assert_eq!(capturer.sandbox_creations(), 1);
}

#[tokio::test]
async fn batch_without_hook_is_a_contract_violation() {
    let doc = three_pane_page();
    let mut capturer = Capturer::new();
    let targets = vec![doc.select("#one"), doc.select("#two")];
    let err = capturer
        .capture_all(&targets, &CaptureOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
    assert_eq!(capturer.sandbox_creations(), 0);
}

#[tokio::test]
async fn teardown_policy_matrix() {
    let doc = three_pane_page();
    let selectors = ["#one", "#two", "#three"];

    for n in 1..=3usize {
        for keep in [true, false] {
            let mut capturer = Capturer::new();
            capturer.on_result(|_| ResultAction::Continue);
            let targets: Vec<_> = selectors[..n].iter().map(|s| doc.select(*s)).collect();
            let overrides = CaptureOptions {
                keep_sandbox_after_capture: Some(keep),
                ..Default::default()
            };
            capturer
                .capture_all(&targets, &overrides)
                .await
                .expect("batch failed");

            assert_eq!(capturer.sandbox_creations(), 1, "n={} keep={}", n, keep);
            let expected_teardowns = if keep { 0 } else { 1 };
            assert_eq!(
                capturer.sandbox_teardowns(),
                expected_teardowns,
                "n={} keep={}",
                n,
                keep
            );
            assert_eq!(capturer.sandbox_alive(), keep, "n={} keep={}", n, keep);
        }
    }
}

#[tokio::test]
async fn a_kept_sandbox_is_reused_by_the_next_batch() {
    let doc = three_pane_page();
    let mut capturer = Capturer::new();

    capturer
        .capture(&doc.select("#one"), &CaptureOptions::default())
        .await
        .expect("capture failed");
    assert!(capturer.sandbox_alive());

    capturer
        .capture(&doc.select("#two"), &CaptureOptions::default())
        .await
        .expect("capture failed");
    assert_eq!(capturer.sandbox_creations(), 1);

    // Once torn down, the next batch pays for a fresh sandbox.
    capturer
        .capture(
            &doc.select("#three"),
            &CaptureOptions {
                keep_sandbox_after_capture: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("capture failed");
    assert!(!capturer.sandbox_alive());

    capturer
        .capture(&doc.select("#one"), &CaptureOptions::default())
        .await
        .expect("capture failed");
    assert_eq!(capturer.sandbox_creations(), 2);
}
