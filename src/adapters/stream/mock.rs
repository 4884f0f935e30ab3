//! Mock stream connector for testing.
//!
//! # Example
//!
//! ```ignore
//! let connector = MockStreamConnector::new()
//!     .with_outcome(MockStreamOutcome::Reject { status: 503 });
//!
//! manager.connect(&credential).await;
//! connector.send("notification", json);
//! connector.end_stream();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::domain::foundation::Credential;
use crate::domain::notification::codec::{STREAM_CONNECTED, STREAM_HEARTBEAT};
use crate::ports::{SseEvent, SseStream, StreamConnector, TransportError};

/// What the mock does for one open attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStreamOutcome {
    /// Open and send the `connected` event.
    Open,
    /// Answer with a non-success status.
    Reject { status: u16 },
    /// Fail before any response.
    Unreachable,
    /// Never answer.
    Hang,
}

/// Mock connector for testing.
#[derive(Clone, Default)]
pub struct MockStreamConnector {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<MockStreamOutcome>,
    fallback: Option<MockStreamOutcome>,
    opens: Vec<String>,
    live: Option<mpsc::UnboundedSender<Result<SseEvent, TransportError>>>,
}

impl MockStreamConnector {
    /// Creates a connector that opens every attempt.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, outcome: MockStreamOutcome) -> Self {
        self.lock().script.push_back(outcome);
        self
    }

    /// Outcome once the script is empty. Defaults to `Open`.
    pub fn with_fallback(self, outcome: MockStreamOutcome) -> Self {
        self.lock().fallback = Some(outcome);
        self
    }

    pub fn push_outcome(&self, outcome: MockStreamOutcome) {
        self.lock().script.push_back(outcome);
    }

    pub fn set_fallback(&self, outcome: MockStreamOutcome) {
        self.lock().fallback = Some(outcome);
    }

    /// Number of open attempts.
    pub fn open_count(&self) -> usize {
        self.lock().opens.len()
    }

    /// URLs of every open attempt.
    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().opens.clone()
    }

    /// A stream is open and its consumer is still reading.
    pub fn is_open(&self) -> bool {
        self.lock().live.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Sends one event on the open stream.
    pub fn send(&self, event: &str, data: &str) -> bool {
        self.lock()
            .live
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(SseEvent::new(event, data))).is_ok())
    }

    pub fn heartbeat(&self) -> bool {
        self.send(STREAM_HEARTBEAT, "")
    }

    /// Ends the stream from the server side.
    pub fn end_stream(&self) {
        self.lock().live = None;
    }

    /// Fails the open stream with an I/O error.
    pub fn fail_stream(&self, reason: &str) {
        if let Some(tx) = self.lock().live.take() {
            let _ = tx.send(Err(TransportError::Io(reason.to_string())));
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StreamConnector for MockStreamConnector {
    async fn open(&self, url: &str, _credential: &Credential) -> Result<SseStream, TransportError> {
        let outcome = {
            let mut state = self.lock();
            state.opens.push(url.to_string());
            let fallback = state.fallback.clone();
            state
                .script
                .pop_front()
                .or(fallback)
                .unwrap_or(MockStreamOutcome::Open)
        };

        match outcome {
            MockStreamOutcome::Open => {}
            MockStreamOutcome::Reject { status } => return Err(TransportError::Rejected { status }),
            MockStreamOutcome::Unreachable => {
                return Err(TransportError::Connect("connection refused".into()))
            }
            MockStreamOutcome::Hang => std::future::pending::<()>().await,
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(SseEvent::new(STREAM_CONNECTED, "ok")));
        self.lock().live = Some(tx);

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}
