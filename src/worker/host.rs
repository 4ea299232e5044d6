//! Owns the computation thread and the channels to it.
//!
//! Requests go through a bounded queue per worker instance; responses come
//! back on one channel shared by every instance the host has started. A
//! replaced instance keeps the request it is running, loses its queue to the
//! new instance and exits.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use thiserror::Error;

use crate::combat::rng::entropy_seed;
use crate::worker::engine::Engine;
use crate::worker::protocol::{Request, Response};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("computation queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("computation worker is gone")]
    Disconnected,
    #[error("no response within {duration_ms} ms")]
    Timeout { duration_ms: u64 },
    #[error("failed to start computation worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct HostConfig {
    pub queue_capacity: usize,
    /// Seed for the first worker; later generations derive from it. Entropy when unset.
    pub seed: Option<u64>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            seed: None,
        }
    }
}

struct Instance {
    generation: u64,
    tx: Sender<Request>,
    /// Kept so pending requests can be handed to a replacement.
    queue: Receiver<Request>,
    handle: JoinHandle<()>,
}

impl Instance {
    fn start(
        generation: u64,
        seed: u64,
        capacity: usize,
        responses: Sender<Response>,
    ) -> Result<Self, WorkerError> {
        let (tx, rx) = bounded::<Request>(capacity);
        let queue = rx.clone();
        let handle = thread::Builder::new()
            .name(format!("attack-odds-worker-{generation}"))
            .spawn(move || {
                let mut engine = Engine::new(seed);
                tracing::debug!(generation, "computation worker started");
                while let Ok(request) = rx.recv() {
                    let nonce = request.nonce();
                    let response = match catch_failure(|| engine.handle(request)) {
                        Ok(response) => response,
                        Err(message) => {
                            tracing::error!(generation, nonce, %message, "request panicked, resetting engine");
                            engine = Engine::new(seed.wrapping_add(nonce));
                            Response::Failed {
                                nonce,
                                error: format!("computation failed: {message}"),
                            }
                        }
                    };
                    if responses.send(response).is_err() {
                        break;
                    }
                }
                tracing::debug!(generation, "computation worker exited");
            })?;
        Ok(Self {
            generation,
            tx,
            queue,
            handle,
        })
    }
}

/// Run `work`, turning a panic into the message it carried.
fn catch_failure(work: impl FnOnce() -> Response) -> Result<Response, String> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Move queued requests from `from` into `to`. When `to` fills up, the
/// request in hand goes back to `fallback` and the rest stay where they are.
/// Returns the number moved, or the request nobody could take.
fn transfer(
    from: &Receiver<Request>,
    to: &Sender<Request>,
    fallback: &Sender<Request>,
) -> Result<usize, Request> {
    let mut moved = 0;
    while let Ok(request) = from.try_recv() {
        if let Err(err) = to.try_send(request) {
            return match fallback.try_send(err.into_inner()) {
                Ok(()) => Ok(moved),
                Err(err) => Err(err.into_inner()),
            };
        }
        moved += 1;
    }
    Ok(moved)
}

pub struct WorkerHost {
    current: Option<Instance>,
    retired: Vec<JoinHandle<()>>,
    responses_tx: Sender<Response>,
    responses: Receiver<Response>,
    capacity: usize,
    base_seed: u64,
}

impl WorkerHost {
    pub fn spawn(config: HostConfig) -> Result<Self, WorkerError> {
        let capacity = config.queue_capacity.max(1);
        let base_seed = config.seed.unwrap_or_else(entropy_seed);
        let (responses_tx, responses) = unbounded();
        let current = Instance::start(0, base_seed, capacity, responses_tx.clone())?;
        Ok(Self {
            current: Some(current),
            retired: Vec::new(),
            responses_tx,
            responses,
            capacity,
            base_seed,
        })
    }

    pub fn generation(&self) -> u64 {
        self.current.as_ref().map_or(0, |instance| instance.generation)
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a request without blocking.
    pub fn submit(&self, request: Request) -> Result<(), WorkerError> {
        let instance = self.current.as_ref().ok_or(WorkerError::Disconnected)?;
        match instance.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(WorkerError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::Disconnected),
        }
    }

    pub fn recv(&self) -> Result<Response, WorkerError> {
        self.responses.recv().map_err(|_| WorkerError::Disconnected)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Response, WorkerError> {
        self.responses.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WorkerError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => WorkerError::Disconnected,
        })
    }

    /// Wait for the response to `nonce`, discarding stale responses to
    /// earlier requests on the way.
    pub fn recv_for(&self, nonce: u64, timeout: Duration) -> Result<Response, WorkerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let response = self.recv_timeout(remaining)?;
            if response.nonce() == nonce {
                return Ok(response);
            }
            tracing::debug!(stale = response.nonce(), wanted = nonce, "discarding stale response");
        }
    }

    /// Submit and wait for the matching response.
    pub fn call(&self, request: Request, timeout: Duration) -> Result<Response, WorkerError> {
        let nonce = request.nonce();
        self.submit(request)?;
        self.recv_for(nonce, timeout)
    }

    /// Start a fresh instance and move queued requests to it. The old
    /// instance finishes whatever it is running, then exits; anything the new
    /// queue cannot take stays with the old instance. Returns the number of
    /// requests moved.
    pub fn replace(&mut self) -> Result<usize, WorkerError> {
        let generation = self.generation() + 1;
        let seed = self.base_seed.wrapping_add(generation);
        let next = Instance::start(generation, seed, self.capacity, self.responses_tx.clone())?;

        let mut moved = 0;
        if let Some(old) = self.current.take() {
            match transfer(&old.queue, &next.tx, &old.tx) {
                Ok(count) => moved = count,
                Err(request) => {
                    let nonce = request.nonce();
                    tracing::warn!(nonce, "request dropped while replacing the worker");
                    let failed = Response::Failed {
                        nonce,
                        error: "request dropped while replacing the worker".to_string(),
                    };
                    if self.responses_tx.send(failed).is_err() {
                        tracing::warn!(nonce, "response channel closed");
                    }
                }
            }
            self.retired.push(old.handle);
        }
        tracing::info!(generation, moved, "computation worker replaced");
        self.current = Some(next);
        Ok(moved)
    }

    /// Close the queue, let the current worker drain it, and join every thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(instance) = self.current.take() {
            drop(instance.tx);
            drop(instance.queue);
            self.retired.push(instance.handle);
        }
        for handle in self.retired.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("computation worker panicked");
            }
        }
    }
}

impl Drop for WorkerHost {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::AttackSetup;
    use crate::worker::protocol::SimulationRequest;

    fn simulate(nonce: u64, iters: u64) -> Request {
        Request::Simulate(SimulationRequest {
            nonce,
            iters_requested: iters,
            setup: AttackSetup::new("1d20+5", "1d8+3", "14"),
            seed: Some(nonce),
        })
    }

    #[test]
    fn responses_echo_request_nonces() {
        let host = WorkerHost::spawn(HostConfig {
            queue_capacity: 4,
            seed: Some(1),
        })
        .unwrap();
        let response = host.call(simulate(5, 100), Duration::from_secs(30)).unwrap();
        assert_eq!(response.nonce(), 5);
        assert!(!response.is_failure());
    }

    #[test]
    fn recv_for_skips_stale_responses() {
        let host = WorkerHost::spawn(HostConfig {
            queue_capacity: 4,
            seed: Some(1),
        })
        .unwrap();
        host.submit(simulate(1, 50)).unwrap();
        host.submit(simulate(2, 50)).unwrap();
        let response = host.recv_for(2, Duration::from_secs(30)).unwrap();
        assert_eq!(response.nonce(), 2);
    }

    #[test]
    fn replaced_host_keeps_answering() {
        let mut host = WorkerHost::spawn(HostConfig {
            queue_capacity: 8,
            seed: Some(3),
        })
        .unwrap();
        for nonce in 1..=3 {
            host.submit(simulate(nonce, 2_000)).unwrap();
        }
        host.replace().unwrap();
        assert_eq!(host.generation(), 1);

        let mut seen: Vec<u64> = (0..3)
            .map(|_| host.recv_timeout(Duration::from_secs(30)).unwrap().nonce())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);

        let response = host.call(simulate(4, 10), Duration::from_secs(30)).unwrap();
        assert_eq!(response.nonce(), 4);
        host.shutdown();
    }

    #[test]
    fn panics_become_failures() {
        assert_eq!(
            catch_failure(|| panic!("attempt to add with overflow")),
            Err("attempt to add with overflow".to_string())
        );
        let answered = catch_failure(|| Response::Failed {
            nonce: 1,
            error: "bad".to_string(),
        });
        assert_eq!(answered.map(|response| response.nonce()), Ok(1));
        assert_eq!(panic_message(&format!("trial {}", 3)), "trial 3");
    }

    #[test]
    fn transfer_keeps_overflow_with_the_old_queue() {
        let (old_tx, old_rx) = bounded::<Request>(4);
        let (next_tx, next_rx) = bounded::<Request>(1);
        for nonce in 1..=3 {
            old_tx.try_send(simulate(nonce, 10)).unwrap();
        }
        let moved = transfer(&old_rx, &next_tx, &old_tx).unwrap();
        assert_eq!(moved, 1);
        assert_eq!(next_rx.try_recv().unwrap().nonce(), 1);
        let mut left: Vec<u64> = old_rx.try_iter().map(|request| request.nonce()).collect();
        left.sort_unstable();
        assert_eq!(left, vec![2, 3]);
    }

    #[test]
    fn full_queue_is_reported() {
        let host = WorkerHost::spawn(HostConfig {
            queue_capacity: 1,
            seed: Some(1),
        })
        .unwrap();
        let mut full = false;
        for nonce in 0..64 {
            if let Err(WorkerError::QueueFull { capacity }) = host.submit(simulate(nonce, 200_000)) {
                assert_eq!(capacity, 1);
                full = true;
                break;
            }
        }
        assert!(full);
    }
}
