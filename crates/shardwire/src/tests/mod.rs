//! Crate-level integration and BDD tests.

pub(crate) mod support;


use std::io;

use rstest::rstest;

use crate::checkpoint::{CheckpointError, DesyncReason};
use crate::error::ShimError;
use crate::protocol::ActionKind;
use crate::tests::support::{Call, RecordingProcessor, run_script};
use crate::transport::TransportError;

#[test]
fn full_lifecycle_answers_every_action_in_order() {
    let mut processor = RecordingProcessor::default().checkpoint_latest_on_shard_end();
    let outcome = run_script(
        &mut processor,
        &[
            r#"{"action":"initialize","shardId":"shardId-000000000001","sequenceNumber":"TRIM_HORIZON"}"#,
            r#"{"action":"processRecords","millisBehindLatest":12,"records":[{"data":"YQ==","partitionKey":"a","sequenceNumber":"1"}]}"#,
            r#"{"action":"shutdownRequested"}"#,
            r#"{"action":"processRecords","records":[]}"#,
            r#"{"action":"shardEnded"}"#,
            r#"{"action":"checkpoint","error":null}"#,
        ],
    );

    outcome.result.as_ref().expect("run should succeed");
    assert_eq!(
        outcome.status_targets(),
        [
            ActionKind::Initialize,
            ActionKind::ProcessRecords,
            ActionKind::ShutdownRequested,
            ActionKind::ProcessRecords,
            ActionKind::ShardEnded,
        ]
    );
    assert_eq!(
        processor.calls,
        [
            Call::Initialize {
                shard_id: String::from("shardId-000000000001"),
                sequence_number: Some(String::from("TRIM_HORIZON")),
                sub_sequence_number: None,
            },
            Call::ProcessRecords {
                records: 1,
                millis_behind_latest: 12,
            },
            Call::ShutdownRequested,
            Call::ProcessRecords {
                records: 0,
                millis_behind_latest: 0,
            },
            Call::ShardEnded,
        ]
    );
}

#[rstest]
#[case::processor(
    ShimError::Processor {
        action: ActionKind::ProcessRecords,
        source: "boom".into(),
    },
    "processor failed while handling processRecords\n  caused by: boom\n"
)]
#[case::handshake(
    ShimError::Handshake {
        action: ActionKind::ShardEnded,
        source: CheckpointError::Desync {
            responding_to: ActionKind::ShardEnded,
            reason: DesyncReason::EndOfInput,
        },
    },
    "checkpoint handshake failed while handling shardEnded\n  caused by: checkpoint handshake \
     desynchronised while handling shardEnded: input ended before the acknowledgement arrived\n"
)]
#[case::transport(
    ShimError::Transport(TransportError::Write(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "pipe closed",
    ))),
    "failed to write to supervisor\n  caused by: pipe closed\n"
)]
fn error_report_names_each_cause_once(#[case] error: ShimError, #[case] expected: &str) {
    let mut stderr = Vec::new();
    crate::report_error(&mut stderr, &error).expect("report is written");
    assert_eq!(String::from_utf8(stderr).expect("utf-8"), expected);
}
