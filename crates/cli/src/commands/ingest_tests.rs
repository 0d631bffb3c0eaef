use super::*;
use pulse_channel::Value;

#[test]
fn parse_line_accepts_objects() {
    let event = parse_line(r#"  {"name":"open","n":3}  "#).unwrap().unwrap();
    assert_eq!(event.get("name"), Some(&Value::String("open".into())));
    assert_eq!(event.get("n"), Some(&Value::UInt(3)));
}

#[test]
fn parse_line_skips_blank_lines() {
    assert!(parse_line("").unwrap().is_none());
    assert!(parse_line("   \t").unwrap().is_none());
}

#[test]
fn parse_line_rejects_non_objects() {
    let err = parse_line("[1,2]").unwrap_err();
    assert!(err.to_string().contains("an array"), "{err}");

    let err = parse_line("{not json").unwrap_err();
    assert!(err.to_string().contains("invalid JSON"), "{err}");
}

#[test]
fn cli_flags_override_profile() {
    let args = IngestArgs {
        profile: Some(Profile::Debug),
        max_batch_size: None,
        interval: Some(2),
        continuous: true,
        out: None,
        store_dir: None,
        no_replay: true,
    };
    let config = build_config(&args);
    assert_eq!(config.max_batch_size, 150);
    assert_eq!(config.batch_interval_secs, 2);
    assert_eq!(config.timer_mode, TimerMode::Continuous);

    let args = IngestArgs {
        max_batch_size: Some(9),
        ..args
    };
    assert_eq!(build_config(&args).max_batch_size, 9);
}

#[test]
fn deliver_remaining_sends_partial_batch() {
    use pulse_channel::{Batch, SendError};
    use pulse_store::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Batch>>);

    impl BatchSender for Recorder {
        fn send(&self, batch: &Batch) -> Result<(), SendError> {
            self.0.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    let sender = Arc::new(Recorder::default());
    let store = Arc::new(MemoryStore::new());
    let channel = Channel::builder(sender.clone(), store.clone())
        .manual_timer()
        .build()
        .unwrap();

    channel.enqueue(Event::new().with("id", 1)).unwrap();
    assert!(deliver_remaining(&channel, Duration::from_secs(5)));
    channel.shutdown();

    let sent = sender.0.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload(), br#"[{"id":1}]"#);
    assert!(store.is_empty());
}
