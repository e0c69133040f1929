use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

/// Tracks which pairs have a generation in flight. At most one request per
/// pair runs at a time; the slot is released when the guard drops.
#[derive(Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

pub struct FlightGuard {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, pair: &str) -> Option<FlightGuard> {
        let key = pair_key(pair);
        if !lock(&self.in_flight).insert(key.clone()) {
            return None;
        }
        Some(FlightGuard {
            key,
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn is_in_flight(&self, pair: &str) -> bool {
        lock(&self.in_flight).contains(&pair_key(pair))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

/// Canonical spelling of a pair for every per-pair guard.
pub fn pair_key(pair: &str) -> String {
    pair.trim().to_uppercase()
}

// The set stays consistent even if a holder panicked mid-insert.
fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
