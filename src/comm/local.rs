//! In-process `Communicator` used by this crate's own tests (and available
//! for single-process multi-"rank" simulation generally): every rank is an
//! OS thread sharing one [`Hub`].
//!
//! Collective calls (`broadcast_bytes`, `all_reduce_*`, `barrier`) are
//! identified purely by each communicator's own call count, not by any
//! shared sequence number. That is sound only because the distributed
//! driver is SPMD: every rank issues exactly the same sequence of
//! collective calls in the same order (no rank ever takes a different
//! branch around a collective), so the Nth collective call on every rank
//! refers to the same logical operation. This is a property of how
//! [`crate::distributed`] is written, not a general guarantee -- a
//! `Communicator` consumer that branched around a collective would corrupt
//! this rendezvous.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use super::{Communicator, SendHandle};
use crate::error::Result;

#[derive(Default)]
struct CollectiveSlot {
    arrived: u32,
    payload: Option<Vec<u8>>,
    acc: Option<f64>,
}

struct HubState {
    mailboxes: HashMap<(u32, u32, u32), VecDeque<Vec<u8>>>,
    collectives: HashMap<u32, CollectiveSlot>,
}

struct Hub {
    size: u32,
    state: Mutex<HubState>,
    cond: Condvar,
}

/// Spawns `size` communicator handles sharing one hub, one per simulated
/// rank. Typical use: hand handle `r` to a thread running the distributed
/// driver as rank `r`.
pub fn local_communicators(size: u32) -> Vec<LocalCommunicator> {
    let hub = Arc::new(Hub {
        size,
        state: Mutex::new(HubState {
            mailboxes: HashMap::new(),
            collectives: HashMap::new(),
        }),
        cond: Condvar::new(),
    });
    (0..size)
        .map(|rank| LocalCommunicator {
            rank,
            size,
            hub: hub.clone(),
            next_step: AtomicU32::new(0),
        })
        .collect()
}

pub struct LocalCommunicator {
    rank: u32,
    size: u32,
    hub: Arc<Hub>,
    next_step: AtomicU32,
}

impl LocalCommunicator {
    fn step(&self) -> u32 {
        self.next_step.fetch_add(1, Ordering::SeqCst)
    }

    fn rendezvous_f64(&self, value: f64, combine: impl Fn(f64, f64) -> f64) -> Result<f64> {
        let step = self.step();
        let mut guard = self.hub.state.lock().unwrap();
        {
            let slot = guard.collectives.entry(step).or_default();
            slot.acc = Some(match slot.acc {
                Some(a) => combine(a, value),
                None => value,
            });
            slot.arrived += 1;
        }
        if guard.collectives[&step].arrived == self.size {
            self.hub.cond.notify_all();
        } else {
            while guard.collectives[&step].arrived < self.size {
                guard = self.hub.cond.wait(guard).unwrap();
            }
        }
        Ok(guard.collectives[&step].acc.unwrap())
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn broadcast_bytes(&self, root: u32, buf: &mut Vec<u8>) -> Result<()> {
        let step = self.step();
        let mut guard = self.hub.state.lock().unwrap();
        {
            let slot = guard.collectives.entry(step).or_default();
            if self.rank == root {
                slot.payload = Some(buf.clone());
            }
            slot.arrived += 1;
        }
        if guard.collectives[&step].arrived == self.size {
            self.hub.cond.notify_all();
        } else {
            while guard.collectives[&step].arrived < self.size {
                guard = self.hub.cond.wait(guard).unwrap();
            }
        }
        let data = guard.collectives[&step]
            .payload
            .clone()
            .expect("broadcast root never posted a payload");
        drop(guard);
        if self.rank != root {
            *buf = data;
        }
        Ok(())
    }

    fn all_reduce_min_f64(&self, value: f64) -> Result<f64> {
        self.rendezvous_f64(value, f64::min)
    }

    fn all_reduce_max_f64(&self, value: f64) -> Result<f64> {
        self.rendezvous_f64(value, f64::max)
    }

    fn barrier(&self) -> Result<()> {
        let step = self.step();
        let mut guard = self.hub.state.lock().unwrap();
        guard.collectives.entry(step).or_default().arrived += 1;
        if guard.collectives[&step].arrived == self.size {
            self.hub.cond.notify_all();
        } else {
            while guard.collectives[&step].arrived < self.size {
                guard = self.hub.cond.wait(guard).unwrap();
            }
        }
        Ok(())
    }

    fn isend_bytes(&self, dest: u32, tag: u32, data: Vec<u8>) -> Box<dyn SendHandle> {
        let mut guard = self.hub.state.lock().unwrap();
        guard
            .mailboxes
            .entry((self.rank, dest, tag))
            .or_default()
            .push_back(data);
        self.hub.cond.notify_all();
        Box::new(LocalSendHandle)
    }

    fn recv_bytes(&self, source: u32, tag: u32) -> Result<Vec<u8>> {
        let mut guard = self.hub.state.lock().unwrap();
        loop {
            if let Some(q) = guard.mailboxes.get_mut(&(source, self.rank, tag)) {
                if let Some(data) = q.pop_front() {
                    return Ok(data);
                }
            }
            guard = self.hub.cond.wait(guard).unwrap();
        }
    }
}

struct LocalSendHandle;

impl SendHandle for LocalSendHandle {
    fn wait(self: Box<Self>) -> Result<()> {
        // The payload was already handed to the mailbox synchronously;
        // there is nothing left to wait for in-process.
        Ok(())
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn is_send_sync<T: Send + Sync>() {}
    is_send_sync::<LocalCommunicator>();
}
