//! Remote sealer: serves work packages and collects hashrates reported by
//! external miners on a dedicated thread.

use super::seal::{pow_target, SealWork};
use crate::algorithm::{seed_hash, EPOCH_LENGTH};
use crate::error::{Result, UbqhashError};
use parking_lot::Mutex;
use primitive_types::H256;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Submitted hashrates older than this are ignored
const HASHRATE_EXPIRY: Duration = Duration::from_secs(10);

enum SealerRequest {
    SubmitHashrate { id: H256, rate: u64 },
    FetchRate(SyncSender<u64>),
    FetchWork(SyncSender<Result<[String; 4]>>),
    NewWork(SealWork),
    Exit,
}

/// Handle to the remote sealer thread
pub struct RemoteSealer {
    requests: Sender<SealerRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteSealer {
    pub(crate) fn start() -> Self {
        let (requests, inbox) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("ubqhash-remote-sealer".into())
            .spawn(move || run(inbox));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(%err, "Failed to start ubqhash remote sealer");
                None
            }
        };
        Self {
            requests,
            worker: Mutex::new(worker),
        }
    }

    /// Record the hashrate of remote miner `id`. False if the sealer stopped.
    pub fn submit_hashrate(&self, id: H256, rate: u64) -> bool {
        self.requests
            .send(SealerRequest::SubmitHashrate { id, rate })
            .is_ok()
    }

    /// Sum of the hashrates submitted within the last 10 seconds
    pub fn submitted_hashrate(&self) -> Result<u64> {
        let (reply, response) = mpsc::sync_channel(1);
        self.requests
            .send(SealerRequest::FetchRate(reply))
            .map_err(|_| UbqhashError::SealerStopped)?;
        response.recv().map_err(|_| UbqhashError::SealerStopped)
    }

    /// Current work package, see [`work_package`]
    pub fn fetch_work(&self) -> Result<[String; 4]> {
        let (reply, response) = mpsc::sync_channel(1);
        self.requests
            .send(SealerRequest::FetchWork(reply))
            .map_err(|_| UbqhashError::SealerStopped)?;
        response.recv().map_err(|_| UbqhashError::SealerStopped)?
    }

    pub(crate) fn publish_work(&self, work: &SealWork) {
        if self.requests.send(SealerRequest::NewWork(work.clone())).is_err() {
            debug!(number = work.number, "Remote sealer stopped, dropping work");
        }
    }

    /// Ask the thread to exit and wait for it.
    pub(crate) fn close(&self) {
        let _ = self.requests.send(SealerRequest::Exit);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("Ubqhash remote sealer panicked");
            }
        }
    }
}

/// Work package handed to remote miners:
/// seal hash, seed hash, boundary (`2^256 / difficulty`) and block number,
/// all `0x`-prefixed hex.
pub fn work_package(work: &SealWork) -> [String; 4] {
    let mut boundary = [0u8; 32];
    pow_target(work.difficulty).to_big_endian(&mut boundary);
    [
        format!("0x{}", hex::encode(work.seal_hash.as_bytes())),
        format!("0x{}", hex::encode(seed_hash(work.number / EPOCH_LENGTH))),
        format!("0x{}", hex::encode(boundary)),
        format!("{:#x}", work.number),
    ]
}

fn run(inbox: Receiver<SealerRequest>) {
    let mut rates: HashMap<H256, (u64, Instant)> = HashMap::new();
    let mut current: Option<[String; 4]> = None;

    while let Ok(request) = inbox.recv() {
        match request {
            SealerRequest::SubmitHashrate { id, rate } => {
                rates.insert(id, (rate, Instant::now()));
            }
            SealerRequest::FetchRate(reply) => {
                let _ = reply.send(live_hashrate(&mut rates, Instant::now()));
            }
            SealerRequest::FetchWork(reply) => {
                let _ = reply.send(current.clone().ok_or(UbqhashError::NoMiningWork));
            }
            SealerRequest::NewWork(work) => {
                current = Some(work_package(&work));
            }
            SealerRequest::Exit => break,
        }
    }
    debug!("Ubqhash remote sealer is exiting");
}

/// Drop expired submissions and sum the rest.
fn live_hashrate(rates: &mut HashMap<H256, (u64, Instant)>, now: Instant) -> u64 {
    rates.retain(|_, (_, seen)| now.saturating_duration_since(*seen) < HASHRATE_EXPIRY);
    rates.values().fold(0u64, |total, (rate, _)| total.saturating_add(*rate))
}
