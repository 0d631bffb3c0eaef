use super::*;
use pulse_protocol::EMPTY_PAYLOAD;
use serde_json::json;

fn closed(prefix: &[u8]) -> serde_json::Value {
    let mut bytes = prefix.to_vec();
    bytes.push(b']');
    serde_json::from_slice(&bytes).expect("prefix plus ] must be valid json")
}

#[test]
fn empty_accumulator_closes_to_empty_array() {
    let mut acc = Accumulator::default();
    assert!(acc.is_empty());
    assert_eq!(closed(acc.open_prefix()), json!([]));

    let batch = acc.snapshot_and_reset(0, Utc::now());
    assert_eq!(batch.payload(), EMPTY_PAYLOAD);
    assert!(batch.is_empty());
}

#[test]
fn prefix_is_closable_after_every_append() {
    let mut acc = Accumulator::new(16);
    let fragments = [r#"{"id":1}"#, r#"{"id":2,"tags":["a"]}"#, r#"{}"#];

    for (i, fragment) in fragments.iter().enumerate() {
        acc.append(fragment.as_bytes());
        assert_eq!(acc.len(), i + 1);

        let parsed = closed(acc.open_prefix());
        assert_eq!(parsed.as_array().map(Vec::len), Some(i + 1));
    }
}

#[test]
fn snapshot_returns_closed_array_and_resets() {
    let mut acc = Accumulator::new(8);
    acc.append(br#"{"id":1}"#);
    acc.append(br#"{"id":2}"#);
    acc.append(br#"{"id":3}"#);

    let batch = acc.snapshot_and_reset(7, Utc::now());
    assert_eq!(batch.payload(), br#"[{"id":1},{"id":2},{"id":3}]"#);
    assert_eq!(batch.item_count(), 3);
    assert_eq!(batch.sequence(), 7);

    assert!(acc.is_empty());
    assert_eq!(acc.open_prefix(), b"[");

    acc.append(br#"{"id":4}"#);
    let next = acc.snapshot_and_reset(8, Utc::now());
    assert_eq!(next.payload(), br#"[{"id":4}]"#);
    // The earlier snapshot is unaffected by later appends.
    assert_eq!(batch.payload(), br#"[{"id":1},{"id":2},{"id":3}]"#);
}

#[test]
fn byte_len_tracks_separators() {
    let mut acc = Accumulator::new(0);
    assert_eq!(acc.byte_len(), 1);
    acc.append(b"1");
    assert_eq!(acc.byte_len(), 2);
    acc.append(b"22");
    assert_eq!(acc.byte_len(), 5);
}
