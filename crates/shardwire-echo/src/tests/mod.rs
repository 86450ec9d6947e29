//! Unit tests for the echo processor.

use mockall::mock;
use rstest::{fixture, rstest};
use shardwire::{CheckpointError, Checkpointer, DesyncReason, Record, RecordProcessor};
use shardwire::protocol::ActionKind;

use crate::{EchoError, EchoProcessor};

mock! {
    Checkpoint {}
    impl Checkpointer for Checkpoint {
        fn checkpoint_at(
            &mut self,
            sequence_number: &str,
            sub_sequence_number: u64,
        ) -> Result<(), CheckpointError>;
        fn checkpoint_latest(&mut self) -> Result<(), CheckpointError>;
    }
}

fn rejected() -> CheckpointError {
    CheckpointError::Rejected {
        message: String::from("ThrottlingException"),
    }
}

fn batch(count: usize) -> Vec<Record> {
    (0..count)
        .map(|index| Record::new(b"abcd", "pk", format!("{}", 100 + index), 0))
        .collect()
}

#[fixture]
fn initialized() -> EchoProcessor {
    let mut processor = EchoProcessor::new(3, 2);
    processor
        .initialize("shardId-000000000007", None, None)
        .expect("initialize");
    processor
}

#[rstest]
fn batch_below_interval_does_not_checkpoint(mut initialized: EchoProcessor) {
    let mut checkpointer = MockCheckpoint::new();
    checkpointer.expect_checkpoint_at().never();
    checkpointer.expect_checkpoint_latest().never();

    initialized
        .process_records(&batch(2), 0, &mut checkpointer)
        .expect("process records");
    assert_eq!(initialized.records_seen(), 2);
    assert_eq!(initialized.bytes_seen(), 8);
}

#[rstest]
fn reaching_interval_checkpoints_last_record(mut initialized: EchoProcessor) {
    let mut checkpointer = MockCheckpoint::new();
    checkpointer
        .expect_checkpoint_at()
        .once()
        .returning(|sequence_number: &str, sub_sequence_number: u64| {
            assert_eq!(sequence_number, "104");
            assert_eq!(sub_sequence_number, 0);
            Ok(())
        });

    initialized
        .process_records(&batch(2), 0, &mut checkpointer)
        .expect("first batch");
    initialized
        .process_records(&batch(5), 0, &mut checkpointer)
        .expect("second batch");
}

#[rstest]
fn empty_batch_never_checkpoints(mut initialized: EchoProcessor) {
    let mut checkpointer = MockCheckpoint::new();
    checkpointer.expect_checkpoint_at().never();

    initialized
        .process_records(&[], 10, &mut checkpointer)
        .expect("empty batch");
}

#[rstest]
fn shard_end_checkpoints_latest(mut initialized: EchoProcessor) {
    let mut checkpointer = MockCheckpoint::new();
    checkpointer
        .expect_checkpoint_latest()
        .once()
        .returning(|| Ok(()));

    initialized
        .shard_ended(&mut checkpointer)
        .expect("shard ended");
}

#[rstest]
fn rejected_checkpoint_is_retried(mut initialized: EchoProcessor) {
    let mut attempts = 0;
    let mut checkpointer = MockCheckpoint::new();
    checkpointer
        .expect_checkpoint_latest()
        .times(3)
        .returning(move || {
            attempts += 1;
            if attempts < 3 { Err(rejected()) } else { Ok(()) }
        });

    initialized
        .shutdown_requested(&mut checkpointer)
        .expect("third attempt succeeds");
}

#[rstest]
fn exhausted_retries_surface_error(mut initialized: EchoProcessor) {
    let mut checkpointer = MockCheckpoint::new();
    checkpointer
        .expect_checkpoint_latest()
        .times(3)
        .returning(|| Err(rejected()));

    let error = initialized
        .shard_ended(&mut checkpointer)
        .expect_err("retries exhausted");
    let echo = error
        .downcast_ref::<EchoError>()
        .expect("error is an EchoError");
    assert!(matches!(echo, EchoError::Checkpoint { attempts: 3, .. }));
}

#[rstest]
fn fatal_checkpoint_error_is_not_retried(mut initialized: EchoProcessor) {
    let mut checkpointer = MockCheckpoint::new();
    checkpointer
        .expect_checkpoint_latest()
        .once()
        .returning(|| {
            Err(CheckpointError::Desync {
                responding_to: ActionKind::ShardEnded,
                reason: DesyncReason::EndOfInput,
            })
        });

    let error = initialized
        .shard_ended(&mut checkpointer)
        .expect_err("desync propagates");
    assert!(error.to_string().contains("after 1 attempt"), "got {error}");
}

#[test]
fn records_before_initialize_are_refused() {
    let mut processor = EchoProcessor::default();
    let mut checkpointer = MockCheckpoint::new();

    let error = processor
        .process_records(&batch(1), 0, &mut checkpointer)
        .expect_err("uninitialized processor");
    assert!(matches!(
        error.downcast_ref::<EchoError>(),
        Some(EchoError::NotInitialized)
    ));
}

#[rstest]
fn invalid_payload_is_logged_not_fatal(mut initialized: EchoProcessor) {
    let record: Record = serde_json::from_str(
        r#"{"data":"%%%","partitionKey":"pk","sequenceNumber":"1"}"#,
    )
    .expect("record decodes");
    let mut checkpointer = MockCheckpoint::new();

    initialized
        .process_records(&[record], 0, &mut checkpointer)
        .expect("invalid payload is tolerated");
    assert_eq!(initialized.records_seen(), 1);
    assert_eq!(initialized.bytes_seen(), 0);
}

#[test]
fn initialize_records_shard() {
    let mut processor = EchoProcessor::default();
    processor
        .initialize("s-1", Some("42"), Some(0))
        .expect("initialize");
    assert_eq!(processor.shard_id(), Some("s-1"));
}
