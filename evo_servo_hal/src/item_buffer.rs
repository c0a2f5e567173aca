//! Buffered ad hoc register requests.
//!
//! Out-of-band callers queue reads and writes of arbitrary registers; the
//! control cycle drains them once per tick. Reads keep one slot per
//! `(id, item)` key and writes coalesce per key, so memory is bounded by
//! the control item catalog no matter how many requests are abandoned.
//! Writes reach the link in the order their keys were first queued.
//!
//! Drains release the table lock while talking to the link. A result is
//! stored only if no newer request replaced the slot meanwhile.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use evo_servo_common::error::{LinkError, RequestError};
use evo_servo_common::link::ActuatorLink;
use evo_servo_common::types::{ActuatorId, RegisterValue};
use tracing::{debug, warn};

type ItemKey = (ActuatorId, String);

#[derive(Debug, Clone)]
enum ReadState {
    Pending,
    Ready(Result<RegisterValue, LinkError>),
}

#[derive(Debug, Clone)]
struct ReadSlot {
    ticket: u64,
    state: ReadState,
}

#[derive(Debug, Default)]
struct Tables {
    reads: HashMap<ItemKey, ReadSlot>,
    writes: Vec<(ItemKey, RegisterValue)>,
    next_ticket: u64,
}

/// Receipt of a queued read, used to wait for its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    /// Actuator addressed
    pub id: ActuatorId,
    /// Register name
    pub item: String,
    ticket: u64,
}

/// Pending-request tables shared by callers and the control cycle.
#[derive(Debug)]
pub struct ItemBuffer {
    catalog: HashMap<ActuatorId, HashSet<String>>,
    tables: Mutex<Tables>,
    ready: Condvar,
}

impl ItemBuffer {
    /// Create a buffer accepting the given items per actuator.
    pub fn new(catalog: HashMap<ActuatorId, Vec<String>>) -> Self {
        Self {
            catalog: catalog
                .into_iter()
                .map(|(id, items)| (id, items.into_iter().collect()))
                .collect(),
            tables: Mutex::new(Tables::default()),
            ready: Condvar::new(),
        }
    }

    /// Build the catalog from the link's control tables.
    pub fn from_link(link: &dyn ActuatorLink, ids: &[ActuatorId]) -> Self {
        Self::new(ids.iter().map(|&id| (id, link.control_items(id))).collect())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn validate(&self, id: ActuatorId, item: &str) -> Result<(), RequestError> {
        match self.catalog.get(&id) {
            Some(items) if items.contains(item) => Ok(()),
            _ => Err(RequestError::UnknownItem {
                id,
                item: item.to_string(),
            }),
        }
    }

    /// Queue a read. A pending read of the same key is replaced.
    ///
    /// # Errors
    /// Returns `RequestError::UnknownItem` if `item` is not in the catalog of `id`.
    pub fn enqueue_read(&self, id: ActuatorId, item: &str) -> Result<RequestHandle, RequestError> {
        self.validate(id, item)?;
        let mut tables = self.lock();
        tables.next_ticket += 1;
        let ticket = tables.next_ticket;
        tables.reads.insert(
            (id, item.to_string()),
            ReadSlot {
                ticket,
                state: ReadState::Pending,
            },
        );
        Ok(RequestHandle {
            id,
            item: item.to_string(),
            ticket,
        })
    }

    /// Queue a write. A pending write of the same key takes the new value
    /// and keeps its place in the queue.
    ///
    /// # Errors
    /// Returns `RequestError::UnknownItem` if `item` is not in the catalog of `id`.
    pub fn enqueue_write(
        &self,
        id: ActuatorId,
        item: &str,
        value: RegisterValue,
    ) -> Result<(), RequestError> {
        self.validate(id, item)?;
        let key = (id, item.to_string());
        let mut tables = self.lock();
        if let Some(pos) = tables.writes.iter().position(|(k, _)| *k == key) {
            tables.writes[pos].1 = value;
        } else {
            tables.writes.push((key, value));
        }
        Ok(())
    }

    /// Whether the latest read of the key has completed.
    pub fn is_ready(&self, id: ActuatorId, item: &str) -> bool {
        self.lock()
            .reads
            .get(&(id, item.to_string()))
            .is_some_and(|slot| matches!(slot.state, ReadState::Ready(_)))
    }

    /// Result of the latest completed read of the key.
    ///
    /// The slot stays in place; a later enqueue of the key replaces it.
    pub fn take_result(&self, id: ActuatorId, item: &str) -> Result<RegisterValue, RequestError> {
        let tables = self.lock();
        match tables.reads.get(&(id, item.to_string())) {
            Some(ReadSlot {
                state: ReadState::Ready(result),
                ..
            }) => result.clone().map_err(RequestError::from),
            _ => Err(RequestError::NotReady {
                id,
                item: item.to_string(),
            }),
        }
    }

    /// Block until `handle` (or a newer read of the same key) completes.
    ///
    /// # Errors
    /// Returns `RequestError::Timeout` if the cycle did not serve the key
    /// within `timeout`, or `RequestError::Link` if the link failed it.
    /// A timeout past the range of `Instant` waits without a deadline.
    pub fn wait(&self, handle: &RequestHandle, timeout: Duration) -> Result<RegisterValue, RequestError> {
        let deadline = Instant::now().checked_add(timeout);
        let key = (handle.id, handle.item.clone());
        let mut tables = self.lock();
        loop {
            match tables.reads.get(&key) {
                Some(ReadSlot {
                    ticket,
                    state: ReadState::Ready(result),
                }) if *ticket >= handle.ticket => {
                    return result.clone().map_err(RequestError::from);
                }
                _ => {}
            }

            let Some(deadline) = deadline else {
                tables = self.ready.wait(tables).unwrap_or_else(|e| e.into_inner());
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return Err(RequestError::Timeout {
                    id: handle.id,
                    item: handle.item.clone(),
                    timeout,
                });
            }
            tables = self
                .ready
                .wait_timeout(tables, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Serve every pending read through the link. Returns the number served.
    pub fn drain_reads(&self, link: &mut dyn ActuatorLink) -> usize {
        let pending: Vec<(ItemKey, u64)> = {
            let tables = self.lock();
            tables
                .reads
                .iter()
                .filter(|(_, slot)| matches!(slot.state, ReadState::Pending))
                .map(|(key, slot)| (key.clone(), slot.ticket))
                .collect()
        };
        if pending.is_empty() {
            return 0;
        }

        let results: Vec<(ItemKey, u64, Result<RegisterValue, LinkError>)> = pending
            .into_iter()
            .map(|((id, item), ticket)| {
                let result = link.read_register(id, &item);
                if let Err(e) = &result {
                    warn!("Ad hoc read of '{}' on ID {} failed: {}", item, id, e);
                }
                ((id, item), ticket, result)
            })
            .collect();

        let served = results.len();
        {
            let mut tables = self.lock();
            for (key, ticket, result) in results {
                if let Some(slot) = tables.reads.get_mut(&key).filter(|s| s.ticket == ticket) {
                    slot.state = ReadState::Ready(result);
                }
            }
        }
        self.ready.notify_all();
        debug!("Served {} ad hoc reads", served);
        served
    }

    /// Issue every pending write through the link. Returns the number issued.
    pub fn drain_writes(&self, link: &mut dyn ActuatorLink) -> usize {
        let pending = std::mem::take(&mut self.lock().writes);
        let issued = pending.len();
        for ((id, item), value) in pending {
            if let Err(e) = link.write_register(id, &item, value) {
                warn!("Ad hoc write of '{}' = {} on ID {} failed: {}", item, value, id, e);
            }
        }
        if issued > 0 {
            debug!("Issued {} ad hoc writes", issued);
        }
        issued
    }

    /// `(pending reads, pending writes)`.
    pub fn pending(&self) -> (usize, usize) {
        let tables = self.lock();
        let reads = tables
            .reads
            .values()
            .filter(|slot| matches!(slot.state, ReadState::Pending))
            .count();
        (reads, tables.writes.len())
    }
}
