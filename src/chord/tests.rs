use super::*;
use crate::signature::Signature;
use serde_json::json;

fn unlock_args() -> ChordUnlock {
    ChordUnlock::new(
        "g1",
        Signature::new("tsum").with_task_id("cb-1"),
        vec![ResultTuple::new("a"), ResultTuple::new("b")],
    )
}

#[test]
fn test_chord_error_displays_reason() {
    let err = ChordError::new("Dependency a raised KeyError(\"x\")");
    assert_eq!(err.to_string(), "Dependency a raised KeyError(\"x\")");
}

#[test]
fn test_callback_error_prefix() {
    let cause = std::io::Error::new(std::io::ErrorKind::Other, "broker down");
    let err = ChordError::callback_error(&cause);
    assert_eq!(err.reason, "Callback error: broker down");
}

#[test]
fn test_chord_error_to_failure() {
    let failure = ChordError::new("boom").to_failure();
    assert_eq!(failure.kind, CHORD_ERROR_KIND);
    assert_eq!(failure.message, "boom");
}

#[test]
fn test_next_attempt_increments_retries_only() {
    let request = UnlockRequest::new(unlock_args().with_max_retries(3));

    let next = request.next_attempt();

    assert_eq!(next.retries, 1);
    assert_eq!(next.args, request.args);
}

#[test]
fn test_remaining_retries() {
    let mut request = UnlockRequest::new(unlock_args());
    assert_eq!(request.remaining_retries(None), None);
    assert_eq!(request.remaining_retries(Some(3)), Some(3));

    request.retries = 5;
    assert_eq!(request.remaining_retries(Some(3)), Some(0));
}

#[test]
fn test_request_survives_encoding() {
    let request = UnlockRequest::new(
        unlock_args()
            .with_interval(Duration::from_millis(500))
            .with_propagate(false),
    )
    .next_attempt();

    let decoded = UnlockRequest::decode(&request.encode().unwrap()).unwrap();

    assert_eq!(decoded, request);
    assert_eq!(decoded.args.interval(), Some(Duration::from_millis(500)));
}

#[test]
fn test_request_decodes_minimal_wire_form() {
    let bytes = serde_json::to_vec(&json!({
        "args": {
            "group_id": "g1",
            "callback": "tsum",
            "result": [{"id": "a"}, {"id": "b", "parent": {"id": "root"}}]
        }
    }))
    .unwrap();

    let request = UnlockRequest::decode(&bytes).unwrap();

    assert_eq!(request.retries, 0);
    assert_eq!(request.args.propagate, None);
    assert_eq!(request.args.max_retries, None);
    assert_eq!(request.args.result[1].parent.as_deref().map(|p| p.id.as_str()), Some("root"));
}

#[test]
fn test_settings_from_config() {
    let config = ChordConfig {
        propagate: false,
        poll_interval_ms: 200,
        join_timeout_ms: 1500,
        max_retries: Some(4),
    };

    let settings = UnlockSettings::from_config(&config);

    assert!(!settings.default_propagate);
    assert_eq!(settings.default_interval, Duration::from_millis(200));
    assert_eq!(settings.join_timeout, Duration::from_millis(1500));
    assert_eq!(settings.default_max_retries, Some(4));
}

#[test]
fn test_sub_millisecond_interval_rounds_up() {
    let args = unlock_args().with_interval(Duration::from_micros(300));
    assert_eq!(args.interval(), Some(Duration::from_millis(1)));

    let args = unlock_args().with_interval(Duration::ZERO);
    assert_eq!(args.interval_ms, Some(MIN_INTERVAL_MS));
}
