//! Store wrapper for tests: counts writes per kind and injects one-shot faults.

use async_trait::async_trait;
use pkg_state::{ObjectStore, Registry, StoreError};
use pkg_types::meta::Resource;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Conflict,
    Unavailable,
    /// Another writer creates the object first; the caller sees AlreadyExists.
    CreatedConcurrently,
}

pub struct FaultyStore {
    inner: Registry,
    faults: Mutex<Vec<(&'static str, Op, Fault)>>,
    writes: Mutex<HashMap<&'static str, usize>>,
}

impl FaultyStore {
    pub async fn new() -> Self {
        Self {
            inner: Registry::in_memory().await.unwrap(),
            faults: Mutex::new(Vec::new()),
            writes: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner
    }

    /// Fail the next `op` on `R` with `fault`.
    pub fn fail_next<R: Resource>(&self, op: Op, fault: Fault) {
        self.faults.lock().unwrap().push((R::KIND, op, fault));
    }

    /// Successful creates and updates of `R` so far.
    pub fn writes<R: Resource>(&self) -> usize {
        self.writes
            .lock()
            .unwrap()
            .get(R::KIND)
            .copied()
            .unwrap_or(0)
    }

    fn take_fault(&self, kind: &'static str, op: Op) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap();
        let idx = faults.iter().position(|(k, o, _)| *k == kind && *o == op)?;
        Some(faults.remove(idx).2)
    }

    fn count(&self, kind: &'static str) {
        *self.writes.lock().unwrap().entry(kind).or_default() += 1;
    }

    fn injected<R: Resource>(fault: Fault, object: &R) -> StoreError {
        match fault {
            Fault::Conflict => StoreError::VersionConflict {
                kind: R::KIND,
                key: object.key(),
                expected: object.metadata().resource_version,
                actual: object.metadata().resource_version + 1,
            },
            Fault::Unavailable => StoreError::unavailable("injected outage"),
            Fault::CreatedConcurrently => StoreError::AlreadyExists {
                kind: R::KIND,
                key: object.key(),
            },
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn get<R: Resource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<R>, StoreError> {
        self.inner.get(namespace, name).await
    }

    async fn create<R: Resource>(&self, object: &R) -> Result<R, StoreError> {
        if let Some(fault) = self.take_fault(R::KIND, Op::Create) {
            if let Fault::CreatedConcurrently = fault {
                self.inner.create(object).await?;
            }
            return Err(Self::injected(fault, object));
        }
        let stored = self.inner.create(object).await?;
        self.count(R::KIND);
        Ok(stored)
    }

    async fn update<R: Resource>(&self, object: &R) -> Result<R, StoreError> {
        if let Some(fault) = self.take_fault(R::KIND, Op::Update) {
            return Err(Self::injected(fault, object));
        }
        let stored = self.inner.update(object).await?;
        self.count(R::KIND);
        Ok(stored)
    }
}
