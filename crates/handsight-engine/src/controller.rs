use std::collections::BTreeSet;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use handsight_contracts::results::AnalysisResult;
use handsight_contracts::uploads::SelectedFile;

use crate::errors::RequestError;
use crate::transport::AnalysisTransport;

pub type AnalysisOutcome = Result<AnalysisResult, RequestError>;

/// Monotonic per controller; later submissions always compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A resolved request. `stale` is set when the caller abandoned the
/// request before it resolved.
#[derive(Debug)]
pub struct Completion {
    pub request_id: RequestId,
    pub outcome: AnalysisOutcome,
    pub stale: bool,
}

struct Delivery {
    request_id: RequestId,
    outcome: AnalysisOutcome,
}

/// Runs each submission on its own worker thread and hands outcomes back
/// over a channel. Holds no opinion on how many requests may be pending;
/// the workflow enforces one.
pub struct AnalysisController {
    transport: Arc<dyn AnalysisTransport>,
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
    next_id: u64,
    pending: BTreeSet<RequestId>,
    abandoned: BTreeSet<RequestId>,
}

impl AnalysisController {
    pub fn new(transport: Arc<dyn AnalysisTransport>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            transport,
            sender,
            receiver,
            next_id: 0,
            pending: BTreeSet::new(),
            abandoned: BTreeSet::new(),
        }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    pub fn submit(&mut self, file: SelectedFile) -> RequestId {
        self.next_id += 1;
        let request_id = RequestId(self.next_id);
        self.pending.insert(request_id);

        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("handsight-analyze-{}", request_id.0))
            .spawn(move || {
                let outcome = transport.analyze(&file);
                // The controller may be gone; nothing left to notify.
                let _ = sender.send(Delivery {
                    request_id,
                    outcome,
                });
            });
        if let Err(err) = spawned {
            let _ = self.sender.send(Delivery {
                request_id,
                outcome: Err(RequestError::network(format!(
                    "analysis worker spawn failed: {err}"
                ))),
            });
        }
        request_id
    }

    /// Marks a pending request as superseded. The transport call is not
    /// aborted; its completion is reported with `stale` set.
    pub fn abandon(&mut self, request_id: RequestId) -> bool {
        if !self.pending.contains(&request_id) {
            return false;
        }
        self.abandoned.insert(request_id)
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains(&request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Non-blocking.
    pub fn try_next(&mut self) -> Option<Completion> {
        match self.receiver.try_recv() {
            Ok(delivery) => Some(self.settle(delivery)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Blocks until a completion arrives, the timeout passes, or nothing
    /// is pending.
    pub fn next_timeout(&mut self, timeout: Option<Duration>) -> Option<Completion> {
        if self.pending.is_empty() {
            return self.try_next();
        }
        let delivery = match timeout {
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(delivery) => delivery,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            },
            None => self.receiver.recv().ok()?,
        };
        Some(self.settle(delivery))
    }

    fn settle(&mut self, delivery: Delivery) -> Completion {
        self.pending.remove(&delivery.request_id);
        let stale = self.abandoned.remove(&delivery.request_id);
        Completion {
            request_id: delivery.request_id,
            outcome: delivery.outcome,
            stale,
        }
    }
}
