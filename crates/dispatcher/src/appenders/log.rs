//! LogAppender that only logs batch summaries via tracing

use contracts::{AppendAck, Batch, ContractError, DestinationConfig, LogAppender};
use tracing::{debug, info, instrument};

/// Acknowledges every batch after logging it (dry runs, demos)
pub struct TracingAppender {
    name: String,
    topic: String,
    appended: u64,
}

impl TracingAppender {
    pub fn new(config: &DestinationConfig) -> Self {
        Self {
            name: "log".to_string(),
            topic: config.topic.clone(),
            appended: 0,
        }
    }

    /// Records acknowledged so far
    pub fn appended(&self) -> u64 {
        self.appended
    }

    fn log_batch_summary(&self, batch: &Batch) {
        let (min, max) = batch
            .records
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r.noise), hi.max(r.noise))
            });

        info!(
            appender = %self.name,
            topic = %self.topic,
            seq = batch.sequence,
            reason = batch.reason.as_str(),
            records = batch.len(),
            noise_min = min,
            noise_max = max,
            "Batch received"
        );
    }
}

impl LogAppender for TracingAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        "log"
    }

    async fn probe(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(
        name = "log_appender_append",
        skip(self, batch),
        fields(seq = batch.sequence)
    )]
    async fn append(&mut self, batch: &Batch) -> Result<AppendAck, ContractError> {
        self.log_batch_summary(batch);
        let base_offset = self.appended;
        self.appended += batch.len() as u64;
        Ok(AppendAck::new(format!("base_offset={base_offset}")))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(appended = self.appended, "TracingAppender closed");
        Ok(())
    }
}
