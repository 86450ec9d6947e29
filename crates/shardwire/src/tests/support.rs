//! Shared fixtures for dispatch tests.

use std::io::Cursor;

use crate::checkpoint::{CheckpointError, Checkpointer};
use crate::error::ShimError;
use crate::processor::{ProcessorError, RecordProcessor};
use crate::protocol::{ActionKind, Record};

/// Callback observed by [`RecordingProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Initialize {
        shard_id: String,
        sequence_number: Option<String>,
        sub_sequence_number: Option<u64>,
    },
    ProcessRecords {
        records: usize,
        millis_behind_latest: u64,
    },
    LeaseLost,
    ShardEnded,
    ShutdownRequested,
}

/// Checkpoint a [`RecordingProcessor`] issues while handling records.
#[derive(Debug, Clone)]
pub(crate) enum CheckpointStep {
    At(String, u64),
    Latest,
}

/// Processor that records its callbacks and issues scripted checkpoints.
#[derive(Default)]
pub(crate) struct RecordingProcessor {
    pub(crate) calls: Vec<Call>,
    pub(crate) on_records: Option<CheckpointStep>,
    pub(crate) on_shard_end: Option<CheckpointStep>,
    pub(crate) on_shutdown_requested: Option<CheckpointStep>,
    pub(crate) propagate_checkpoint_errors: bool,
    pub(crate) checkpoint_outcomes: Vec<Result<(), CheckpointError>>,
    pub(crate) fail_on: Option<ActionKind>,
}

impl RecordingProcessor {
    pub(crate) fn checkpoint_on_records(mut self, step: CheckpointStep) -> Self {
        self.on_records = Some(step);
        self
    }

    pub(crate) fn checkpoint_latest_on_shard_end(mut self) -> Self {
        self.on_shard_end = Some(CheckpointStep::Latest);
        self
    }

    pub(crate) fn checkpoint_on_shutdown_requested(mut self, step: CheckpointStep) -> Self {
        self.on_shutdown_requested = Some(step);
        self
    }

    pub(crate) fn propagating_checkpoint_errors(mut self) -> Self {
        self.propagate_checkpoint_errors = true;
        self
    }

    pub(crate) fn failing_on(mut self, action: ActionKind) -> Self {
        self.fail_on = Some(action);
        self
    }

    fn outcome(&self, action: ActionKind) -> Result<(), ProcessorError> {
        if self.fail_on == Some(action) {
            return Err(format!("processor refused {action}").into());
        }
        Ok(())
    }

    fn checkpoint(
        &mut self,
        step: Option<CheckpointStep>,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        let Some(step) = step else {
            return Ok(());
        };
        let result = match step {
            CheckpointStep::At(sequence, sub) => checkpointer.checkpoint_at(&sequence, sub),
            CheckpointStep::Latest => checkpointer.checkpoint_latest(),
        };
        self.checkpoint_outcomes.push(result.clone());
        if self.propagate_checkpoint_errors {
            result?;
        }
        Ok(())
    }
}

impl RecordProcessor for RecordingProcessor {
    fn initialize(
        &mut self,
        shard_id: &str,
        sequence_number: Option<&str>,
        sub_sequence_number: Option<u64>,
    ) -> Result<(), ProcessorError> {
        self.calls.push(Call::Initialize {
            shard_id: shard_id.to_owned(),
            sequence_number: sequence_number.map(str::to_owned),
            sub_sequence_number,
        });
        self.outcome(ActionKind::Initialize)
    }

    fn process_records(
        &mut self,
        records: &[Record],
        millis_behind_latest: u64,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        self.calls.push(Call::ProcessRecords {
            records: records.len(),
            millis_behind_latest,
        });
        self.checkpoint(self.on_records.clone(), checkpointer)?;
        self.outcome(ActionKind::ProcessRecords)
    }

    fn lease_lost(&mut self) -> Result<(), ProcessorError> {
        self.calls.push(Call::LeaseLost);
        self.outcome(ActionKind::LeaseLost)
    }

    fn shard_ended(&mut self, checkpointer: &mut dyn Checkpointer) -> Result<(), ProcessorError> {
        self.calls.push(Call::ShardEnded);
        self.checkpoint(self.on_shard_end.clone(), checkpointer)?;
        self.outcome(ActionKind::ShardEnded)
    }

    fn shutdown_requested(
        &mut self,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        self.calls.push(Call::ShutdownRequested);
        self.checkpoint(self.on_shutdown_requested.clone(), checkpointer)?;
        self.outcome(ActionKind::ShutdownRequested)
    }
}

/// Outcome of running the dispatcher over a scripted input.
pub(crate) struct ScriptOutcome {
    pub(crate) result: Result<(), ShimError>,
    pub(crate) lines: Vec<serde_json::Value>,
}

impl ScriptOutcome {
    /// Returns the `responseFor` of each status line, in order.
    pub(crate) fn status_targets(&self) -> Vec<ActionKind> {
        self.lines
            .iter()
            .filter(|line| line["action"] == "status")
            .map(|line| {
                serde_json::from_value(line["responseFor"].clone()).expect("status target")
            })
            .collect()
    }

    /// Returns the `action` of each written line, in order.
    pub(crate) fn written_actions(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| line["action"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}

/// Feeds `input` (one entry per line) to a dispatcher driving `processor`.
pub(crate) fn run_script(processor: &mut RecordingProcessor, input: &[&str]) -> ScriptOutcome {
    let mut text = input.join("\n");
    text.push('\n');
    let mut output = Vec::new();
    let result = crate::run(&mut *processor, Cursor::new(text.into_bytes()), &mut output);
    let lines = String::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("output line is JSON"))
        .collect();
    ScriptOutcome { result, lines }
}
