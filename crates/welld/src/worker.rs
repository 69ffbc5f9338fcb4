//! Collaborators on dedicated OS threads, called with a bounded wait.
//!
//! Camera, ONNX sessions and the SQLite connection each live on their own
//! thread and are driven through a capacity-1 job channel. A caller never
//! waits longer than the worker's timeout: a full queue is `Busy`, a late
//! reply is `Timeout`, and a dead thread is `Unavailable`.

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;
use thiserror::Error;
use well_core::{
    CollabError, Embedding, Emotions, FaceAnalyzer, Frame, FrameSource, PersonId, PersonStore,
    Reading, ReadingSink,
};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} failed to start: {reason}")]
    Init { name: String, reason: String },
}

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Handle to a thread that owns an `S`.
pub struct Worker<S> {
    name: String,
    tx: SyncSender<Job<S>>,
    timeout: Duration,
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: 'static> Worker<S> {
    /// Spawn the thread and build its state there with `init`.
    ///
    /// Blocks until `init` finishes so startup failures (missing model,
    /// unopenable database) surface here rather than on the first call.
    pub fn spawn<F, E>(name: &str, timeout: Duration, init: F) -> Result<Self, WorkerError>
    where
        F: FnOnce() -> Result<S, E> + Send + 'static,
        E: std::fmt::Display,
    {
        let (tx, rx) = mpsc::sync_channel::<Job<S>>(1);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);
        let thread_name = name.to_string();

        std::thread::Builder::new()
            .name(format!("well-{name}"))
            .spawn(move || {
                let mut state = match init() {
                    Ok(state) => {
                        let _ = ready_tx.send(Ok(()));
                        state
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                tracing::debug!(worker = %thread_name, "worker thread started");
                while let Ok(job) = rx.recv() {
                    job(&mut state);
                }
                tracing::debug!(worker = %thread_name, "worker thread exiting");
            })
            .map_err(|source| WorkerError::Spawn {
                name: name.to_string(),
                source,
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                name: name.to_string(),
                tx,
                timeout,
            }),
            Ok(Err(reason)) => Err(WorkerError::Init {
                name: name.to_string(),
                reason,
            }),
            Err(_) => Err(WorkerError::Init {
                name: name.to_string(),
                reason: "thread exited during startup".to_string(),
            }),
        }
    }

    /// Run `f` on the worker thread and wait at most the worker's timeout.
    pub fn call<T, F>(&self, f: F) -> Result<T, CollabError>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job<S> = Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        });

        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::debug!(worker = %self.name, "worker busy");
                CollabError::Busy
            }
            TrySendError::Disconnected(_) => {
                CollabError::Unavailable(format!("{} worker is gone", self.name))
            }
        })?;

        reply_rx.recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => {
                tracing::warn!(worker = %self.name, timeout = ?self.timeout, "worker call timed out");
                CollabError::Timeout
            }
            RecvTimeoutError::Disconnected => {
                CollabError::Unavailable(format!("{} worker dropped the call", self.name))
            }
        })
    }
}

impl<S: FrameSource + 'static> FrameSource for Worker<S> {
    fn capture(&mut self) -> Result<Option<Frame>, CollabError> {
        self.call(|s| s.capture())?
    }
}

impl<S: FaceAnalyzer + 'static> FaceAnalyzer for Worker<S> {
    fn detect_face(&mut self, frame: &Frame) -> Result<bool, CollabError> {
        let frame = frame.clone();
        self.call(move |s| s.detect_face(&frame))?
    }

    fn embed(&mut self, frame: &Frame) -> Result<Embedding, CollabError> {
        let frame = frame.clone();
        self.call(move |s| s.embed(&frame))?
    }

    fn classify_emotion(&mut self, frame: &Frame) -> Result<Emotions, CollabError> {
        let frame = frame.clone();
        self.call(move |s| s.classify_emotion(&frame))?
    }
}

impl<S: PersonStore + 'static> PersonStore for Worker<S> {
    fn list_embeddings(&mut self) -> Result<Vec<(PersonId, Embedding)>, CollabError> {
        self.call(|s| s.list_embeddings())?
    }

    fn load_embedding(&mut self, id: &str) -> Result<Option<Embedding>, CollabError> {
        let id = id.to_string();
        self.call(move |s| s.load_embedding(&id))?
    }

    fn upsert_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<(), CollabError> {
        let (id, embedding) = (id.to_string(), embedding.clone());
        self.call(move |s| s.upsert_embedding(&id, &embedding))?
    }
}

impl<S: ReadingSink + 'static> ReadingSink for Worker<S> {
    fn persist(&mut self, reading: &Reading) -> Result<(), CollabError> {
        let reading = reading.clone();
        self.call(move |s| s.persist(&reading))?
    }
}
