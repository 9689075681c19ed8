//! # Request Correlation
//!
//! Monotonic request id generation and the rendezvous between `request`
//! callers and the read loop.
//!
//! Each pending request parks its caller on a single-slot oneshot channel.
//! The read loop delivers the matching reply to exactly one waiter; a reply
//! arriving after the entry was cancelled (timeout or shutdown) finds no
//! waiter and falls through to normal dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use super::response::Response;

/// Monotonic 64-bit request id source. The first id handed out is 1; id 0 is
/// reserved on the wire for uncorrelated frames.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> RequestIdGenerator {
        RequestIdGenerator::default()
    }

    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Tracks callers awaiting correlated replies.
#[derive(Debug, Default)]
pub struct RequestManager {
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
    id_gen: RequestIdGenerator,
}

impl RequestManager {
    pub fn new() -> RequestManager {
        RequestManager::default()
    }

    /// Draw a fresh request id and park a waiter for its reply.
    pub fn start_request(&self) -> (u64, oneshot::Receiver<Response>) {
        let request_id = self.id_gen.next();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id, tx);
        (request_id, rx)
    }

    /// Whether a waiter is currently parked for this id.
    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&request_id)
    }

    /// Deliver a reply to the parked waiter, removing the entry.
    ///
    /// Returns `false` when no waiter exists (late reply after a cancel);
    /// the response is dropped and the caller decides what to do with the
    /// frame.
    pub fn complete(&self, request_id: u64, response: Response) -> bool {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request_id);
        match waiter {
            // The receiver may already be gone if the caller timed out
            // between removal and send; either way the reply is consumed.
            Some(tx) => {
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Remove a pending entry without delivering anything.
    pub fn cancel_request(&self, request_id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request_id);
    }

    /// Drop every parked waiter. Their `await`s resolve to a channel error,
    /// which the request path surfaces as `ConnectionClosed`.
    pub fn abort_all(&self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of requests currently awaiting replies.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
