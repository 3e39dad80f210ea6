//! The output-surface aliasing contract: shared identity by default,
//! independently owned buffers with `copy_output_per_result`.

use domsnap::{CaptureOptions, Capturer, Document, ResultAction};

fn two_pane_page() -> domsnap::DocumentHandle {
    Document::new(
        "<html><body>\
         <div id='left'><h1>Left pane</h1></div>\
         <div id='right'><p>Right pane reads differently.</p></div>\
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
async fn shared_surface_is_overwritten_in_place() {
    let doc = two_pane_page();
    let right_digest = solo_digest(&doc, "#right").await;

    let mut capturer = Capturer::new();
    capturer.on_result(|_| ResultAction::Continue);
    let targets = vec![doc.select("#left"), doc.select("#right")];
    let results = capturer
        .capture_all(&targets, &CaptureOptions::default())
        .await
        .expect("batch failed");

    // Same surface identity: the later paint replaced the earlier pixels.
    assert!(results[0].shares_surface(&results[1]));
    assert_eq!(results[0].digest(), results[1].digest());
    assert_eq!(results[0].digest(), right_digest);
}

#[tokio::test]
async fn per_result_copies_are_independent() {
    let doc = two_pane_page();
    let left_digest = solo_digest(&doc, "#left").await;
    let right_digest = solo_digest(&doc, "#right").await;

    let mut capturer = Capturer::new();
    capturer.on_result(|_| ResultAction::Continue);
    let targets = vec![doc.select("#left"), doc.select("#right")];
    let overrides = CaptureOptions {
        copy_output_per_result: Some(true),
        ..Default::default()
    };
    let results = capturer
        .capture_all(&targets, &overrides)
        .await
        .expect("batch failed");

    assert!(!results[0].shares_surface(&results[1]));
    // Byte-for-byte: the first result survived the second paint untouched.
    assert_eq!(results[0].digest(), left_digest);
    assert_eq!(results[1].digest(), right_digest);
    assert_ne!(results[0].digest(), results[1].digest());
}

#[tokio::test]
async fn copies_are_taken_before_the_hook_runs() {
    use std::sync::{Arc, Mutex};

    let doc = two_pane_page();
    let identities = Arc::new(Mutex::new(Vec::new()));
    let sink = identities.clone();

    let mut capturer = Capturer::new();
    capturer.on_result(move |result| {
        sink.lock().expect("poisoned").push(result.clone());
        ResultAction::Continue
    });

    let targets = vec![doc.select("#left"), doc.select("#right")];
    let overrides = CaptureOptions {
        copy_output_per_result: Some(true),
        ..Default::default()
    };
    let results = capturer
        .capture_all(&targets, &overrides)
        .await
        .expect("batch failed");

    // What the hook retained is the same buffer the batch returned.
    let retained = identities.lock().expect("poisoned");
    assert!(retained[0].shares_surface(&results[0]));
    assert!(retained[1].shares_surface(&results[1]));
    assert!(!retained[0].shares_surface(&retained[1]));
}

#[tokio::test]
async fn each_batch_gets_its_own_surface() {
    let doc = two_pane_page();

    let mut capturer = Capturer::new();
    let first = capturer
        .capture(&doc.select("#left"), &CaptureOptions::default())
        .await
        .expect("capture failed");
    let before = first.digest();

    // Sharing is scoped to one batch; a later batch allocates a fresh
    // surface, so results retained across batches keep their pixels.
    let second = capturer
        .capture(&doc.select("#right"), &CaptureOptions::default())
        .await
        .expect("capture failed");

    assert!(!first.shares_surface(&second));
    assert_eq!(first.digest(), before);
}
