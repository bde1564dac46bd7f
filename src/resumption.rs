//! Cache of resumable session state, keyed by resumption id.
//!
//! A completed handshake deposits its shared secret here; a later
//! Sigma1 carrying the id can then skip certificate exchange entirely.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::messages::RESUMPTION_ID_LEN;
use crate::session_params::SessionParameters;

pub const DEFAULT_CAPACITY: usize = 64;
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Everything a later session needs to resume without certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionRecord {
    pub resumption_id: [u8; RESUMPTION_ID_LEN],
    pub shared_secret: Vec<u8>,
    pub peer_node_id: u64,
    pub fabric_index: u8,
    pub session_params: SessionParameters,
}

struct Entry {
    record: ResumptionRecord,
    touched: Instant,
}

/// Bounded store of resumption records. Expired records are dropped on
/// lookup; at capacity the least recently touched record is evicted.
pub struct ResumptionStore {
    entries: Mutex<HashMap<[u8; RESUMPTION_ID_LEN], Entry>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for ResumptionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ResumptionStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<[u8; RESUMPTION_ID_LEN], Entry>> {
        match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fetch a record and refresh its LRU position. Expired records are
    /// removed and reported as absent.
    pub fn lookup(&self, resumption_id: &[u8; RESUMPTION_ID_LEN]) -> Option<ResumptionRecord> {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = match entries.get_mut(resumption_id) {
            Some(entry) => {
                if now.duration_since(entry.touched) <= self.ttl {
                    entry.touched = now;
                    return Some(entry.record.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            log::debug!("resumption record {} expired", hex::encode(resumption_id));
            entries.remove(resumption_id);
        }
        None
    }

    pub fn put(&self, record: ResumptionRecord) {
        let mut entries = self.lock();
        Self::make_room(&mut entries, self.capacity, self.ttl);
        entries.insert(
            record.resumption_id,
            Entry {
                record,
                touched: Instant::now(),
            },
        );
    }

    /// Replace `old_id` with a fresh record under a single lock
    /// acquisition, so no window exists where both ids resume.
    pub fn rotate(&self, old_id: &[u8; RESUMPTION_ID_LEN], record: ResumptionRecord) {
        let mut entries = self.lock();
        entries.remove(old_id);
        Self::make_room(&mut entries, self.capacity, self.ttl);
        entries.insert(
            record.resumption_id,
            Entry {
                record,
                touched: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, resumption_id: &[u8; RESUMPTION_ID_LEN]) -> bool {
        self.lock().remove(resumption_id).is_some()
    }

    /// Drop every record belonging to a removed fabric.
    pub fn invalidate_fabric(&self, fabric_index: u8) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.record.fabric_index != fabric_index);
        before - entries.len()
    }

    /// Maintenance sweep: purge every expired record, then evict least
    /// recently touched records until the store is back within capacity.
    /// Returns the number of records removed.
    pub fn evict_expired_or_oldest(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        Self::sweep(&mut entries, self.capacity, self.ttl);
        before - entries.len()
    }

    fn make_room(
        entries: &mut HashMap<[u8; RESUMPTION_ID_LEN], Entry>,
        capacity: usize,
        ttl: Duration,
    ) {
        if entries.len() < capacity {
            return;
        }
        // leave room for the record about to be inserted
        Self::sweep(entries, capacity - 1, ttl);
    }

    fn sweep(entries: &mut HashMap<[u8; RESUMPTION_ID_LEN], Entry>, max_len: usize, ttl: Duration) {
        let now = Instant::now();
        entries.retain(|_, e| now.duration_since(e.touched) <= ttl);
        while entries.len() > max_len {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.touched)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => entries.remove(&id),
                None => break,
            };
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone out all live records, e.g. for persistence by the embedding
    /// session manager. Expired records are skipped.
    pub fn snapshot(&self) -> Vec<ResumptionRecord> {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|e| now.duration_since(e.touched) <= self.ttl)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Load previously snapshotted records. Restored records start a
    /// fresh TTL window.
    pub fn restore(&self, records: impl IntoIterator<Item = ResumptionRecord>) {
        for record in records {
            self.put(record);
        }
    }
}
