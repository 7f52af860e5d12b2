
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_core::errors::CODE_TIMEOUT;
use bridge_host::{
    BridgeConfig, BridgeError, BridgeHost, CapabilityRecord, Generation, GenerationTag, Promise,
};
use serde_json::json;

use fixtures::{generation, geo_record};

fn hanging_record(held: Arc<Mutex<Vec<Promise>>>) -> CapabilityRecord {
    CapabilityRecord::builder("Hang")
        .promise_method("forever", [], move |_, promise| {
            held.lock().unwrap().push(promise);
        })
        .build()
        .expect("record")
}

#[tokio::test]
async fn call_returns_the_resolved_value() {
    let generation = generation("async-call");
    generation.register(geo_record()).expect("register");
    let value = generation
        .call("Geo", "getLocation", vec![])
        .await
        .expect("resolved");
    assert_eq!(value["latitude"], json!(52.37));
}

#[tokio::test]
async fn call_surfaces_dispatch_errors() {
    let generation = generation("async-errors");
    generation.register(geo_record()).expect("register");
    let err = generation
        .call("Geo", "getLocation", vec![json!("extra")])
        .await
        .expect_err("arity");
    assert!(matches!(err, BridgeError::ArgumentMismatch(_)), "{err:?}");
}

#[tokio::test]
async fn unsettled_calls_time_out() {
    let config = BridgeConfig {
        call_timeout_ms: Some(50),
        ..BridgeConfig::default()
    };
    let generation =
        Generation::new(GenerationTag::new("timeouts").expect("tag"), &config).expect("generation");
    let held = Arc::new(Mutex::new(Vec::new()));
    generation.register(hanging_record(held.clone())).expect("register");

    let err = generation
        .call("Hang", "forever", vec![])
        .await
        .expect_err("timed out");
    assert!(matches!(err, BridgeError::Timeout(_)), "{err:?}");
    assert_eq!(err.code(), CODE_TIMEOUT);
    assert_eq!(err.info().context.get("method").map(String::as_str), Some("forever"));

    // The timed-out call is still pending until the body or teardown settles it.
    assert_eq!(generation.pending_count(), 1);
    assert_eq!(generation.teardown(), 1);
}

#[tokio::test]
async fn explicit_limit_overrides_the_configured_timeout() {
    let generation = generation("explicit-limit");
    let held = Arc::new(Mutex::new(Vec::new()));
    generation.register(hanging_record(held.clone())).expect("register");
    let err = generation
        .call_with_timeout("Hang", "forever", vec![], Duration::from_millis(20))
        .await
        .expect_err("timed out");
    assert!(matches!(err, BridgeError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn host_call_routes_by_tag() {
    let host = BridgeHost::new(BridgeConfig::default()).expect("host");
    let tag = GenerationTag::new("hosted").expect("tag");
    host.create_generation(tag.clone()).expect("generation");
    host.register(&tag, geo_record()).expect("register");
    let value = host
        .call(&tag, "Geo", "getLocation", vec![])
        .await
        .expect("resolved");
    assert_eq!(value["longitude"], json!(4.89));

    host.teardown_generation(&tag).expect("teardown");
    let err = host
        .call(&tag, "Geo", "getLocation", vec![])
        .await
        .expect_err("torn down");
    assert!(matches!(err, BridgeError::GenerationTornDown(_)), "{err:?}");
}
