//! Sequential candidate processing.
//!
//! Watch events are reduced to candidate paths and queued in arrival order.
//! A path already waiting in the queue is not queued twice. Candidates are
//! handled one at a time; events that arrive while a candidate is being
//! waited on or transferred pile up in the channel and are drained between
//! candidates.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::StageMoveError;
use crate::orchestrator::{MoveOrchestrator, MoveOutcome};
use crate::shutdown;
use crate::stat::StatSampler;
use crate::transfer::Transfer;
use crate::watch::{self, WatchEvent};

/// How often the idle loop wakes up to look at the shutdown flag.
const IDLE_TICK: Duration = Duration::from_millis(250);

/// FIFO of candidate paths with duplicate suppression.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    order: VecDeque<PathBuf>,
    pending: HashSet<PathBuf>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `path`; false if it is already waiting.
    pub fn push(&mut self, path: PathBuf) -> bool {
        if !self.pending.insert(path.clone()) {
            return false;
        }
        self.order.push_back(path);
        true
    }

    pub fn pop(&mut self) -> Option<PathBuf> {
        let path = self.order.pop_front()?;
        self.pending.remove(&path);
        Some(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.pending.contains(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Owns the orchestrator and the queue feeding it.
#[derive(Debug)]
pub struct Pipeline<T, S> {
    orchestrator: MoveOrchestrator<T, S>,
    queue: CandidateQueue,
}

impl<T: Transfer, S: StatSampler> Pipeline<T, S> {
    pub fn new(orchestrator: MoveOrchestrator<T, S>) -> Self {
        Self {
            orchestrator,
            queue: CandidateQueue::new(),
        }
    }

    pub fn orchestrator(&self) -> &MoveOrchestrator<T, S> {
        &self.orchestrator
    }

    /// Number of candidates waiting to be handled.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.queue.contains(path)
    }

    /// Queue a path directly (used for the startup scan).
    pub fn enqueue(&mut self, path: PathBuf) {
        if !self.queue.push(path.clone()) {
            debug!(path = %path.display(), "Already queued");
        }
    }

    /// Queue the candidate carried by `event`, if it carries one.
    pub fn enqueue_event(&mut self, event: &WatchEvent) {
        for path in watch::candidates(event) {
            self.enqueue(path);
        }
    }

    /// Handle every queued candidate in order.
    ///
    /// Stops early on shutdown, leaving the rest queued. A fatal error is
    /// returned immediately and the remaining candidates stay queued.
    pub fn drain(&mut self) -> Result<Vec<MoveOutcome>, StageMoveError> {
        let mut outcomes = Vec::new();
        while !shutdown::is_requested() {
            let Some(path) = self.queue.pop() else { break };
            outcomes.push(self.orchestrator.handle(&path)?);
        }
        Ok(outcomes)
    }

    /// Consume watch events until shutdown is requested or the sender side
    /// goes away, handling candidates as they become available.
    pub fn run(&mut self, events: &Receiver<WatchEvent>) -> Result<(), StageMoveError> {
        loop {
            if shutdown::is_requested() {
                info!(pending = self.pending(), "Shutdown requested; stopping");
                return Ok(());
            }

            // Pick up whatever arrived while we were busy.
            while let Ok(ev) = events.try_recv() {
                self.enqueue_event(&ev);
            }

            if let Some(path) = self.queue.pop() {
                self.orchestrator.handle(&path)?;
                continue;
            }

            match events.recv_timeout(IDLE_TICK) {
                Ok(ev) => self.enqueue_event(&ev),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Event source closed");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::transfer::TransferOutcome;
    use assert_fs::prelude::*;
    use serial_test::serial;
    use std::cell::RefCell;
    use std::ffi::OsString;
    use std::sync::mpsc;

    #[test]
    fn queue_is_fifo_and_suppresses_duplicates() {
        let mut q = CandidateQueue::new();
        assert!(q.push("/s/a".into()));
        assert!(q.push("/s/b".into()));
        assert!(!q.push("/s/a".into()));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(PathBuf::from("/s/a")));
        // Once handed out, the same path may be queued again.
        assert!(q.push("/s/a".into()));
        assert_eq!(q.pop(), Some(PathBuf::from("/s/b")));
        assert_eq!(q.pop(), Some(PathBuf::from("/s/a")));
        assert!(q.is_empty());
    }

    /// Records the source operand of every invocation; optionally fails to spawn.
    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<String>>,
        spawn_fails: bool,
    }

    impl Transfer for Recorder {
        fn invoke(&self, args: &[OsString]) -> Result<TransferOutcome, StageMoveError> {
            if self.spawn_fails {
                return Err(StageMoveError::SpawnFailed {
                    executable: "rclone".into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            self.seen
                .borrow_mut()
                .push(args[1].to_string_lossy().into_owned());
            Ok(TransferOutcome {
                exit_code: Some(0),
                duration: Duration::ZERO,
                progress: vec![],
            })
        }
    }

    fn config_for(root: &Path) -> Config {
        let mut cfg = Config::new(root.to_path_buf(), "remote:".to_string());
        cfg.polling_interval = Duration::from_millis(10);
        cfg
    }

    #[test]
    #[serial]
    fn drain_handles_candidates_in_arrival_order() {
        shutdown::reset();
        let root = assert_fs::TempDir::new().unwrap();
        root.child("b.bin").write_str("b").unwrap();
        root.child("a.bin").write_str("a").unwrap();

        let rec = Recorder::default();
        let cfg = config_for(root.path());
        let mut pipeline = Pipeline::new(MoveOrchestrator::new(
            &cfg,
            &rec,
            crate::stat::FsSampler,
        ));
        pipeline.enqueue(root.path().join("b.bin"));
        pipeline.enqueue(root.path().join("a.bin"));
        pipeline.enqueue(root.path().join("b.bin"));

        let outcomes = pipeline.drain().unwrap();
        assert_eq!(outcomes.len(), 2);
        let seen = rec.seen.borrow();
        assert!(seen[0].ends_with("b.bin"));
        assert!(seen[1].ends_with("a.bin"));
    }

    #[test]
    fn arriving_directory_queues_each_file_once() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("Show/ep1.mkv").write_str("1").unwrap();
        root.child("Show/s01/ep2.mkv").write_str("2").unwrap();

        let rec = Recorder::default();
        let cfg = config_for(root.path());
        let mut pipeline = Pipeline::new(MoveOrchestrator::new(
            &cfg,
            &rec,
            crate::stat::FsSampler,
        ));
        let ep1 = root.path().join("Show/ep1.mkv");
        pipeline.enqueue_event(&WatchEvent::Created(ep1.clone()));
        pipeline.enqueue_event(&WatchEvent::Created(root.path().join("Show")));

        assert_eq!(pipeline.pending(), 2);
        assert!(pipeline.is_pending(&ep1));
        assert!(pipeline.is_pending(&root.path().join("Show/s01/ep2.mkv")));
    }

    #[test]
    #[serial]
    fn spawn_failure_stops_processing_and_keeps_the_rest_queued() {
        shutdown::reset();
        let root = assert_fs::TempDir::new().unwrap();
        root.child("one.bin").write_str("1").unwrap();
        root.child("two.bin").write_str("2").unwrap();

        let rec = Recorder {
            spawn_fails: true,
            ..Default::default()
        };
        let cfg = config_for(root.path());
        let mut pipeline = Pipeline::new(MoveOrchestrator::new(
            &cfg,
            &rec,
            crate::stat::FsSampler,
        ));
        pipeline.enqueue(root.path().join("one.bin"));
        pipeline.enqueue(root.path().join("two.bin"));

        let err = pipeline.drain().unwrap_err();
        assert_eq!(err.code(), 3);
        assert_eq!(pipeline.pending(), 1);
        assert!(pipeline.is_pending(&root.path().join("two.bin")));
    }

    #[test]
    #[serial]
    fn run_consumes_events_until_the_sender_is_dropped() {
        shutdown::reset();
        let root = assert_fs::TempDir::new().unwrap();
        root.child("dir").create_dir_all().unwrap();
        root.child("dir/new.bin").write_str("n").unwrap();

        let rec = Recorder::default();
        let cfg = config_for(root.path());
        let mut pipeline = Pipeline::new(MoveOrchestrator::new(
            &cfg,
            &rec,
            crate::stat::FsSampler,
        ));

        let (tx, rx) = mpsc::channel();
        let file = root.path().join("dir/new.bin");
        tx.send(WatchEvent::Modified(file.clone())).unwrap();
        tx.send(WatchEvent::Created(root.path().join("dir"))).unwrap();
        tx.send(WatchEvent::Created(file.clone())).unwrap();
        tx.send(WatchEvent::Created(file.clone())).unwrap();
        drop(tx);

        pipeline.run(&rx).unwrap();
        assert_eq!(rec.seen.borrow().len(), 1);
        assert!(rec.seen.borrow()[0].ends_with("new.bin"));
    }

    #[test]
    #[serial]
    fn run_returns_promptly_on_shutdown() {
        shutdown::reset();
        let root = assert_fs::TempDir::new().unwrap();
        let rec = Recorder::default();
        let cfg = config_for(root.path());
        let mut pipeline = Pipeline::new(MoveOrchestrator::new(
            &cfg,
            &rec,
            crate::stat::FsSampler,
        ));
        let (_tx, rx) = mpsc::channel::<WatchEvent>();
        shutdown::request();
        pipeline.run(&rx).unwrap();
        shutdown::reset();
        assert!(rec.seen.borrow().is_empty());
    }
}
