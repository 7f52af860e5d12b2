use bridge_core::errors::{
    CODE_DUPLICATE_NAME, CODE_GENERATION_TORN_DOWN, CODE_METHOD_NOT_FOUND, CODE_MODULE_NOT_FOUND,
};
use bridge_core::{BridgeError, ErrorInfo, MethodError};

#[test]
fn duplicate_name_surface() {
    let err = BridgeError::duplicate_name("Geo");
    assert_eq!(err.code(), CODE_DUPLICATE_NAME);
    assert_eq!(err.info().context.get("name").map(String::as_str), Some("Geo"));
}

#[test]
fn module_not_found_surface() {
    let err = BridgeError::module_not_found("Camera");
    assert!(matches!(err, BridgeError::ModuleNotFound(_)));
    assert_eq!(err.code(), CODE_MODULE_NOT_FOUND);
    assert!(err.message().contains("Camera"));
}

#[test]
fn method_not_found_surface() {
    let err = BridgeError::method_not_found("Geo", "getLocationX");
    assert_eq!(err.code(), CODE_METHOD_NOT_FOUND);
    assert!(err.info().context.contains_key("module"));
    assert!(err.info().context.contains_key("method"));
}

#[test]
fn generation_torn_down_surface() {
    let err = BridgeError::generation_torn_down("ABI44_0_0").with_context("call_id", "7");
    assert_eq!(err.code(), CODE_GENERATION_TORN_DOWN);
    assert_eq!(err.info().context.get("call_id").map(String::as_str), Some("7"));
}

#[test]
fn method_error_keeps_provider_code() {
    let err: BridgeError = MethodError::new("E_LOCATION_UNAVAILABLE", "no fix").into();
    match &err {
        BridgeError::NativeInvocationFailure(info) => {
            assert_eq!(info.code, "E_LOCATION_UNAVAILABLE");
            assert_eq!(info.message, "no fix");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn display_includes_context_and_hint() {
    let info = ErrorInfo::new("bridge.config.queue", "queue name is empty")
        .with_context("field", "default_queue")
        .with_hint("set default_queue to a non-empty name");
    let rendered = BridgeError::Config(info).to_string();
    assert!(rendered.starts_with("config error: queue name is empty"));
    assert!(rendered.contains("field=default_queue"));
    assert!(rendered.contains("hint: set default_queue"));
}

#[test]
fn errors_serialize_with_kind_tag() {
    let err = BridgeError::module_not_found("Geo");
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["kind"], "ModuleNotFound");
    let parsed: BridgeError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(parsed, err);
}
