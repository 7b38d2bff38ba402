use keystash_storage::envelope::MAX_ENTRY_SIZE;
use keystash_storage::{BackendError, MemoryBackend, SecretBackend, SecretStorage, SecretValue};
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

pub const NS: &str = "keystash-tests";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Get,
    Set,
    Delete,
}

/// One backend call as seen by [`FaultyBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub call: Call,
    pub key: String,
}

impl Op {
    #[must_use]
    pub fn get(key: &str) -> Self {
        Self { call: Call::Get, key: key.to_owned() }
    }

    #[must_use]
    pub fn set(key: &str) -> Self {
        Self { call: Call::Set, key: key.to_owned() }
    }

    #[must_use]
    pub fn delete(key: &str) -> Self {
        Self { call: Call::Delete, key: key.to_owned() }
    }
}

#[derive(Debug)]
struct Fault {
    call: Call,
    key: String,
    remaining: Option<usize>,
}

/// Parks the first matching backend call until the test releases it.
#[derive(Debug)]
pub struct Gate {
    entered: Barrier,
    release: Barrier,
}

impl Gate {
    /// Blocks until the gated call has been reached.
    pub fn wait_entered(&self) {
        self.entered.wait();
    }

    /// Lets the gated call proceed.
    pub fn release(&self) {
        self.release.wait();
    }
}

/// A [`MemoryBackend`] with a real entry limit, call recording, fault injection and gates.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    faults: Mutex<Vec<Fault>>,
    gates: Mutex<Vec<(Call, String, Arc<Gate>)>>,
    ops: Mutex<Vec<Op>>,
}

impl Default for FaultyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultyBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::with_entry_limit(MAX_ENTRY_SIZE),
            faults: Mutex::default(),
            gates: Mutex::default(),
            ops: Mutex::default(),
        }
    }

    /// Makes every `call` on `key` fail until [`FaultyBackend::heal`].
    pub fn fail(&self, call: Call, key: &str) {
        self.faults.lock().push(Fault { call, key: key.to_owned(), remaining: None });
    }

    /// Makes the next `call` on `key` fail.
    pub fn fail_once(&self, call: Call, key: &str) {
        self.faults.lock().push(Fault { call, key: key.to_owned(), remaining: Some(1) });
    }

    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    /// Parks the next `call` on `key` until the returned gate is released.
    #[must_use]
    pub fn gate(&self, call: Call, key: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate { entered: Barrier::new(2), release: Barrier::new(2) });
        self.gates.lock().push((call, key.to_owned(), Arc::clone(&gate)));
        gate
    }

    #[must_use]
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    /// Sorted keys currently stored in `namespace`, bypassing recording and faults.
    #[must_use]
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.inner.keys(namespace)
    }

    /// Raw entry at `(NS, key)`, bypassing recording and faults.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(NS, key).ok()
    }

    /// Writes a raw entry at `(NS, key)`, bypassing recording and faults.
    pub fn seed(&self, key: &str, value: &str) {
        self.inner.set(NS, key, value).expect("seed value exceeds the entry limit");
    }

    fn enter(&self, call: Call, key: &str) -> Result<(), BackendError> {
        self.ops.lock().push(Op { call, key: key.to_owned() });

        let gate = {
            let mut gates = self.gates.lock();
            let found = gates.iter().position(|(c, k, _)| *c == call && k == key);
            found.map(|i| gates.swap_remove(i).2)
        };
        if let Some(gate) = gate {
            gate.entered.wait();
            gate.release.wait();
        }

        let mut faults = self.faults.lock();
        let Some(i) = faults.iter().position(|f| f.call == call && f.key == key) else {
            return Ok(());
        };
        if let Some(remaining) = faults[i].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.swap_remove(i);
            }
        }
        Err(BackendError::from(format!("injected {call:?} failure at {key}")))
    }
}

impl SecretBackend for FaultyBackend {
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        self.enter(Call::Set, key)?;
        self.inner.set(namespace, key, value)
    }

    fn get(&self, namespace: &str, key: &str) -> Result<String, BackendError> {
        self.enter(Call::Get, key)?;
        self.inner.get(namespace, key)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        self.enter(Call::Delete, key)?;
        self.inner.delete(namespace, key)
    }
}

/// Creates a storage over a fresh [`FaultyBackend`] and returns both.
#[must_use]
pub fn setup<V: SecretValue>() -> (Arc<FaultyBackend>, SecretStorage<V>) {
    let backend = Arc::new(FaultyBackend::new());
    let storage = SecretStorage::builder().backend(Arc::clone(&backend)).build();
    (backend, storage)
}

/// A deterministic ASCII payload of exactly `len` bytes.
#[must_use]
pub fn payload(len: usize) -> String {
    (0..len).map(|i| char::from(b'a' + u8::try_from(i % 26).unwrap_or(0))).collect()
}
