// src/context.rs
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::output::{OutputSink, StdoutSink};

/// Process-wide handles given to a subscriber at construction.
#[derive(Clone)]
pub struct ProcessContext {
    /// Fired once when the process should shut down.
    pub shutdown: CancellationToken,
    /// Where received messages are written.
    pub sink: Arc<dyn OutputSink>,
}

impl ProcessContext {
    pub fn new(shutdown: CancellationToken, sink: Arc<dyn OutputSink>) -> Self {
        Self { shutdown, sink }
    }

    pub fn with_sink(sink: Arc<dyn OutputSink>) -> Self {
        Self::new(CancellationToken::new(), sink)
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::with_sink(Arc::new(StdoutSink))
    }
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
