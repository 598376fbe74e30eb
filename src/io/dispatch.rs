use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::http::ApiError;
use crate::model::container::BoardData;
use crate::model::item::ItemRecord;
use crate::ops::optimistic::{MoveFailure, MoveRequest, MoveTarget};

/// The backend move call
pub trait MoveApi {
    fn move_item(&self, item_id: &str, target: &MoveTarget) -> Result<ItemRecord, MoveFailure>;
}

/// Where full board images come from
pub trait BoardSource {
    fn fetch_board(&self, board_id: &str) -> Result<BoardData, ApiError>;
}

/// A finished backend call, delivered through [`Dispatcher::poll`]
#[derive(Debug)]
pub enum Completion {
    Moved {
        request_id: u64,
        result: Result<ItemRecord, MoveFailure>,
    },
    Fetched(Result<BoardData, ApiError>),
}

enum Job {
    Move(MoveRequest),
    Fetch(String),
}

/// Runs backend calls on one worker thread, in submission order, so the
/// session never blocks on the network.
pub struct Dispatcher {
    jobs: Option<mpsc::Sender<Job>>,
    rx: mpsc::Receiver<Completion>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn start<A>(api: A) -> Self
    where
        A: MoveApi + BoardSource + Send + 'static,
    {
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            for job in job_rx {
                let done = match job {
                    Job::Move(req) => {
                        debug!(request = req.request_id, item = %req.item_id, "sending move");
                        Completion::Moved {
                            request_id: req.request_id,
                            result: api.move_item(&req.item_id, &req.target),
                        }
                    }
                    Job::Fetch(board_id) => {
                        debug!(board = %board_id, "fetching board");
                        Completion::Fetched(api.fetch_board(&board_id))
                    }
                };
                if tx.send(done).is_err() {
                    return;
                }
            }
        });
        Dispatcher {
            jobs: Some(jobs),
            rx,
            handle: Some(handle),
        }
    }

    pub fn dispatch(&self, request: MoveRequest) {
        self.submit(Job::Move(request));
    }

    pub fn request_resync(&self, board_id: &str) {
        self.submit(Job::Fetch(board_id.to_string()));
    }

    fn submit(&self, job: Job) {
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(job);
        }
    }

    /// Non-blocking poll for finished calls.
    /// Returns all queued completions (may be empty).
    pub fn poll(&self) -> Vec<Completion> {
        let mut done = Vec::new();
        while let Ok(c) = self.rx.try_recv() {
            done.push(c);
        }
        done
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the job queue ends the worker once in-flight calls return
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
