use std::collections::BTreeSet;
use std::sync::Arc;

use bridge_host::{ArgSpec, BridgeError, CapabilityRecord, QueueAffinity, Registry};
use proptest::prelude::*;
use serde_json::json;

fn record(name: &str, marker: &'static str) -> CapabilityRecord {
    CapabilityRecord::builder(name)
        .sync_method("marker", [], move |_| Ok(json!(marker)))
        .build()
        .expect("record")
}

#[test]
fn duplicate_registration_keeps_the_first_record() {
    let mut registry = Registry::new();
    let first = registry.register(record("Clipboard", "first")).expect("first");
    let err = registry
        .register(
            CapabilityRecord::builder("Clipboard")
                .affinity(QueueAffinity::dedicated("other"))
                .sync_method("paste", [ArgSpec::string()], |_| Ok(json!(null)))
                .build()
                .expect("second"),
        )
        .expect_err("duplicate");
    assert!(matches!(err, BridgeError::DuplicateName(_)), "{err:?}");
    assert_eq!(err.code(), "bridge.duplicate_name");

    let current = registry.lookup("Clipboard").expect("lookup");
    assert!(Arc::ptr_eq(&first, &current));
    assert!(current.method("marker").is_some());
    assert!(current.method("paste").is_none());
    assert_eq!(current.affinity(), &QueueAffinity::Default);
    assert_eq!(registry.len(), 1);
}

#[test]
fn missing_entries_report_what_was_missing() {
    let mut registry = Registry::new();
    registry.register(record("Haptics", "h")).expect("register");

    match registry.lookup("Camera") {
        Err(BridgeError::ModuleNotFound(info)) => {
            assert_eq!(info.context.get("module").map(String::as_str), Some("Camera"));
        }
        other => panic!("unexpected lookup result: {other:?}"),
    }
    match registry.method_descriptor("Haptics", "vibrate") {
        Err(BridgeError::MethodNotFound(info)) => {
            assert_eq!(info.context.get("method").map(String::as_str), Some("vibrate"));
        }
        other => panic!("unexpected descriptor result: {other:?}"),
    }
    assert!(registry.method_descriptor("Haptics", "marker").is_ok());
}

#[test]
fn clear_releases_every_record() {
    let mut registry = Registry::new();
    let held = registry.register(record("Battery", "b")).expect("register");
    registry.register(record("Network", "n")).expect("register");
    assert_eq!(Arc::strong_count(&held), 2);
    assert_eq!(registry.clear(), 2);
    assert!(registry.is_empty());
    assert_eq!(Arc::strong_count(&held), 1);
}

proptest! {
    #[test]
    fn lookup_returns_exactly_what_was_registered(
        names in prop::collection::vec("[A-Z][a-zA-Z]{0,8}", 1..24),
    ) {
        let mut registry = Registry::new();
        let mut accepted = BTreeSet::new();
        for name in &names {
            let outcome = registry.register(record(name, "p"));
            if accepted.insert(name.clone()) {
                prop_assert!(outcome.is_ok());
            } else {
                prop_assert!(matches!(outcome, Err(BridgeError::DuplicateName(_))));
            }
        }
        prop_assert_eq!(registry.len(), accepted.len());
        prop_assert_eq!(registry.names(), accepted.iter().cloned().collect::<Vec<_>>());
        for name in &accepted {
            let found = registry.lookup(name).expect("registered");
            prop_assert_eq!(found.name(), name.as_str());
        }
        prop_assert!(registry.lookup("unregistered-name").is_err());
    }
}
