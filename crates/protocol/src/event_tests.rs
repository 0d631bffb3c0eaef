use super::*;
use serde_json::json;

#[test]
fn insert_preserves_order_and_replaces_in_place() {
    let mut event = Event::new().with("b", 1).with("a", "x").with("c", true);
    event.insert("a", "y");

    let keys: Vec<&str> = event.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["b", "a", "c"]);
    assert_eq!(event.get("a"), Some(&Value::String("y".into())));
    assert_eq!(event.len(), 3);
}

#[test]
fn serializes_fields_in_insertion_order() {
    let event = Event::new()
        .with("zeta", 1)
        .with("alpha", Value::Null)
        .with("nested", Event::new().with("k", vec![1u8, 2]));

    let json = serde_json::to_string(&event).expect("serialize event");
    assert_eq!(json, r#"{"zeta":1,"alpha":null,"nested":{"k":[1,2]}}"#);
}

#[test]
fn to_json_maps_every_variant() {
    let event = Event::new()
        .with("null", Value::Null)
        .with("bool", false)
        .with("neg", -3i32)
        .with("big", u64::MAX)
        .with("float", 1.5)
        .with("nan", f64::NAN)
        .with("str", "hi")
        .with("list", vec!["a", "b"])
        .with("none", Option::<i64>::None);

    assert_eq!(
        event.to_json(),
        json!({
            "null": null,
            "bool": false,
            "neg": -3,
            "big": u64::MAX,
            "float": 1.5,
            "nan": null,
            "str": "hi",
            "list": ["a", "b"],
            "none": null,
        })
    );
}

#[test]
fn try_from_json_accepts_only_objects() {
    let event = Event::try_from(json!({"id": 7, "tags": ["x"], "ratio": 0.25, "neg": -1}))
        .expect("object is an event");

    assert_eq!(event.get("id"), Some(&Value::UInt(7)));
    assert_eq!(event.get("neg"), Some(&Value::Int(-1)));
    assert_eq!(event.get("ratio"), Some(&Value::Float(0.25)));
    assert_eq!(
        event.get("tags"),
        Some(&Value::List(vec![Value::String("x".into())]))
    );

    assert!(Event::try_from(json!([1, 2])).is_err());
    assert!(Event::try_from(json!("text")).is_err());
}

#[test]
fn from_iterator_collects_pairs() {
    let event: Event = [("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
    assert_eq!(event.len(), 2);
    assert_eq!(event.get("a"), Some(&Value::Int(3)));
}
