//! Reference shard processor that logs what it receives and checkpoints.
//!
//! `EchoProcessor` writes a structured event for every batch, checkpoints
//! periodically at the last record of a batch, and always checkpoints when
//! the shard ends or a shutdown is requested. Checkpoints the supervisor
//! rejects are retried a bounded number of times.

#[cfg(test)]
mod tests;

use shardwire::{CheckpointError, Checkpointer, ProcessorError, Record, RecordProcessor};
use shardwire_config::Config;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by [`EchoProcessor`].
#[derive(Debug, Error)]
pub enum EchoError {
    /// A checkpoint was still failing after the configured retries.
    #[error("checkpoint failed after {attempts} attempt(s)")]
    Checkpoint {
        /// Number of attempts made.
        attempts: u32,
        /// Last checkpoint failure.
        #[source]
        source: CheckpointError,
    },
    /// A callback arrived before `initialize`.
    #[error("processor has not been initialized")]
    NotInitialized,
}

/// Position a checkpoint is requested at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    At(String, u64),
    Latest,
}

/// Logging processor with periodic and final checkpoints.
#[derive(Debug)]
pub struct EchoProcessor {
    checkpoint_every: u64,
    checkpoint_retries: u32,
    shard_id: Option<String>,
    since_checkpoint: u64,
    records_seen: u64,
    bytes_seen: u64,
}

impl EchoProcessor {
    /// Creates a processor checkpointing every `checkpoint_every` records
    /// (zero disables periodic checkpoints) and retrying rejected
    /// checkpoints up to `checkpoint_retries` times.
    #[must_use]
    pub const fn new(checkpoint_every: u64, checkpoint_retries: u32) -> Self {
        Self {
            checkpoint_every,
            checkpoint_retries,
            shard_id: None,
            since_checkpoint: 0,
            records_seen: 0,
            bytes_seen: 0,
        }
    }

    /// Creates a processor from runtime configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.checkpoint_every(), config.checkpoint_retries())
    }

    /// Returns the shard assigned by `initialize`.
    #[must_use]
    pub fn shard_id(&self) -> Option<&str> {
        self.shard_id.as_deref()
    }

    /// Returns the number of records processed so far.
    #[must_use]
    pub const fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Returns the total decoded payload size processed so far.
    #[must_use]
    pub const fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    fn shard(&self) -> Result<&str, EchoError> {
        self.shard_id.as_deref().ok_or(EchoError::NotInitialized)
    }

    fn checkpoint(
        &mut self,
        checkpointer: &mut dyn Checkpointer,
        position: &Position,
    ) -> Result<(), EchoError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = match position {
                Position::At(sequence, sub) => checkpointer.checkpoint_at(sequence, *sub),
                Position::Latest => checkpointer.checkpoint_latest(),
            };
            match outcome {
                Ok(()) => {
                    self.since_checkpoint = 0;
                    return Ok(());
                }
                Err(error) if error.is_recoverable() && attempts <= self.checkpoint_retries => {
                    warn!(attempts, %error, "retrying rejected checkpoint");
                }
                Err(source) => return Err(EchoError::Checkpoint { attempts, source }),
            }
        }
    }
}

impl Default for EchoProcessor {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RecordProcessor for EchoProcessor {
    fn initialize(
        &mut self,
        shard_id: &str,
        sequence_number: Option<&str>,
        sub_sequence_number: Option<u64>,
    ) -> Result<(), ProcessorError> {
        info!(
            shard_id,
            sequence_number, sub_sequence_number, "echo processor initialized"
        );
        self.shard_id = Some(shard_id.to_owned());
        Ok(())
    }

    fn process_records(
        &mut self,
        records: &[Record],
        millis_behind_latest: u64,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        let shard_id = self.shard()?.to_owned();
        let mut batch_bytes = 0_u64;
        for record in records {
            match record.decode_data() {
                Ok(payload) => {
                    batch_bytes = batch_bytes
                        .saturating_add(u64::try_from(payload.len()).unwrap_or(u64::MAX));
                }
                Err(error) => warn!(
                    sequence_number = record.sequence_number(),
                    %error,
                    "record payload is not valid base64"
                ),
            }
        }

        let count = u64::try_from(records.len()).unwrap_or(u64::MAX);
        self.records_seen = self.records_seen.saturating_add(count);
        self.bytes_seen = self.bytes_seen.saturating_add(batch_bytes);
        self.since_checkpoint = self.since_checkpoint.saturating_add(count);

        info!(
            shard_id = shard_id.as_str(),
            records = records.len(),
            bytes = batch_bytes,
            millis_behind_latest,
            first_sequence_number = records.first().map(Record::sequence_number),
            last_sequence_number = records.last().map(Record::sequence_number),
            "processed batch"
        );

        let Some(last) = records.last() else {
            return Ok(());
        };
        if self.checkpoint_every > 0 && self.since_checkpoint >= self.checkpoint_every {
            let position = Position::At(
                last.sequence_number().to_owned(),
                last.sub_sequence_number(),
            );
            self.checkpoint(checkpointer, &position)?;
        }
        Ok(())
    }

    fn lease_lost(&mut self) -> Result<(), ProcessorError> {
        info!(
            shard_id = self.shard_id(),
            records_seen = self.records_seen,
            "lease lost"
        );
        Ok(())
    }

    fn shard_ended(&mut self, checkpointer: &mut dyn Checkpointer) -> Result<(), ProcessorError> {
        info!(
            shard_id = self.shard_id(),
            records_seen = self.records_seen,
            "shard ended; writing final checkpoint"
        );
        self.checkpoint(checkpointer, &Position::Latest)?;
        Ok(())
    }

    fn shutdown_requested(
        &mut self,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        info!(shard_id = self.shard_id(), "shutdown requested; checkpointing");
        self.checkpoint(checkpointer, &Position::Latest)?;
        Ok(())
    }
}
