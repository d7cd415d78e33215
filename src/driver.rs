use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::query::{FetchOutcome, FetchRequest};

/// The data-fetch function a list view supplies.
///
/// Transport, timeouts and retries are the source's business; errors come back as data.
pub trait DataSource: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = FetchOutcome> + Send;
}

/// A finished fetch, tagged with the sequence number of its request.
#[derive(Debug)]
pub struct Completion {
    pub seq: u64,
    pub outcome: FetchOutcome,
}

/// Runs fetches concurrently on the tokio runtime and hands back completions in the order
/// they finish. Ordering is not corrected here: the controller drops stale ones.
pub struct FetchDriver<D> {
    source: Arc<D>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<D: DataSource> FetchDriver<D> {
    pub fn new(source: D) -> Self {
        FetchDriver::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<D>) -> Self {
        let (tx, rx) = unbounded_channel();
        FetchDriver {
            source,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, request: FetchRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let seq = request.seq;
            let outcome = source.fetch(request).await;
            if tx.send(Completion { seq, outcome }).is_err() {
                log::debug!("driver dropped before fetch {seq} finished");
            }
        });
    }

    /// Waits for the next fetch to finish; `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(completion)
    }
}
