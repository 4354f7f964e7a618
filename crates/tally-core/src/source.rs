use std::collections::VecDeque;

use async_trait::async_trait;

use tally_model::JobSpec;

/// Supplier of jobs for the governor.
///
/// Returning `None` signals "no more jobs" and moves the governor into its
/// draining phase. Implementations live outside the core (a plan file, a
/// queue, an interactive prompt); the engine only ever pulls.
#[async_trait]
pub trait JobSource: Send {
    /// Next job to run, or `None` when the source is exhausted.
    async fn next_job(&mut self) -> Option<JobSpec>;
}

/// In-memory FIFO job source.
pub struct QueueSource {
    jobs: VecDeque<JobSpec>,
}

impl QueueSource {
    pub fn new(jobs: impl IntoIterator<Item = JobSpec>) -> Self {
        Self {
            jobs: jobs.into_iter().collect(),
        }
    }
}

#[async_trait]
impl JobSource for QueueSource {
    async fn next_job(&mut self) -> Option<JobSpec> {
        self.jobs.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::{JobSource, QueueSource};
    use tally_model::JobSpec;

    #[tokio::test]
    async fn queue_source_yields_in_order_then_none() {
        let mut source = QueueSource::new([JobSpec::new("ls"), JobSpec::new("pwd")]);

        assert_eq!(source.next_job().await.unwrap().command, "ls");
        assert_eq!(source.next_job().await.unwrap().command, "pwd");
        assert!(source.next_job().await.is_none());
        assert!(source.next_job().await.is_none());
    }
}
