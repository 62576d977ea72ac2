//! In-memory provisioning service double used by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::provisioning::{
    CreateResult, Entitlement, ExistingRecord, Identifier, LinkTarget, Lookup,
    ProvisioningService, RecordAttributes, RecordId, ServiceError,
};

/// Failure to inject for one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Lookup,
    Create,
    /// Create reports the record as already existing, as if another writer won
    CreateRace,
    Link,
    Grant,
    /// Lookup never completes
    Hang,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub lookup: usize,
    pub create: usize,
    pub link: usize,
    pub grant: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.lookup + self.create + self.link + self.grant
    }
}

#[derive(Default)]
struct State {
    records: HashMap<Identifier, RecordId>,
    attributes: HashMap<Identifier, RecordAttributes>,
    links: HashSet<(RecordId, String)>,
    grants: Vec<(RecordId, Entitlement)>,
    faults: HashMap<Identifier, HashSet<Fault>>,
    calls: CallCounts,
}

impl State {
    fn identifier_of(&self, record_id: &RecordId) -> Option<Identifier> {
        self.records
            .iter()
            .find(|(_, id)| *id == record_id)
            .map(|(identifier, _)| identifier.clone())
    }

    fn has_fault(&self, identifier: &Identifier, fault: Fault) -> bool {
        self.faults
            .get(identifier)
            .map(|set| set.contains(&fault))
            .unwrap_or(false)
    }
}

#[derive(Default)]
pub struct MemoryService {
    state: Mutex<State>,
}

fn link_key(target: &LinkTarget) -> String {
    match target {
        LinkTarget::TrainingBatch { batch_id } => format!("batch:{}", batch_id),
        LinkTarget::Membership { tier, .. } => format!("membership:{}", tier.as_str()),
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, identifier: &Identifier) -> RecordId {
        let record_id = RecordId::new_v4();
        self.state
            .lock()
            .unwrap()
            .records
            .insert(identifier.clone(), record_id);
        record_id
    }

    pub fn seed_linked(&self, identifier: &Identifier, target: LinkTarget) -> RecordId {
        let record_id = self.seed(identifier);
        self.state
            .lock()
            .unwrap()
            .links
            .insert((record_id, link_key(&target)));
        record_id
    }

    pub fn inject(&self, identifier: &Identifier, fault: Fault) {
        self.state
            .lock()
            .unwrap()
            .faults
            .entry(identifier.clone())
            .or_default()
            .insert(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().unwrap().faults.clear();
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn grant_count(&self) -> usize {
        self.state.lock().unwrap().grants.len()
    }

    pub fn attributes_of(&self, identifier: &Identifier) -> Option<RecordAttributes> {
        self.state.lock().unwrap().attributes.get(identifier).cloned()
    }

    pub fn grants_for(&self, identifier: &Identifier) -> Vec<Entitlement> {
        let state = self.state.lock().unwrap();
        match state.records.get(identifier) {
            Some(record_id) => state
                .grants
                .iter()
                .filter(|(id, _)| id == record_id)
                .map(|(_, entitlement)| entitlement.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_linked(&self, identifier: &Identifier, target: &LinkTarget) -> bool {
        let state = self.state.lock().unwrap();
        match state.records.get(identifier) {
            Some(record_id) => state.links.contains(&(*record_id, link_key(target))),
            None => false,
        }
    }
}

#[async_trait]
impl ProvisioningService for MemoryService {
    async fn lookup(
        &self,
        identifier: &Identifier,
        target: Option<&LinkTarget>,
    ) -> Result<Lookup, ServiceError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.calls.lookup += 1;
            if state.has_fault(identifier, Fault::Lookup) {
                return Err(ServiceError::Backend("lookup rejected".to_string()));
            }
            state.has_fault(identifier, Fault::Hang)
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let state = self.state.lock().unwrap();
        Ok(match state.records.get(identifier) {
            Some(record_id) => Lookup::Existing(ExistingRecord {
                record_id: *record_id,
                linked: target
                    .map(|t| state.links.contains(&(*record_id, link_key(t))))
                    .unwrap_or(true),
            }),
            None => Lookup::NotFound,
        })
    }

    async fn create(
        &self,
        identifier: &Identifier,
        attributes: &RecordAttributes,
    ) -> Result<CreateResult, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        if state.has_fault(identifier, Fault::Create) {
            return Err(ServiceError::Backend("create rejected".to_string()));
        }
        if let Some(existing) = state.records.get(identifier) {
            return Ok(CreateResult::AlreadyExists(Some(*existing)));
        }

        let record_id = RecordId::new_v4();
        state.records.insert(identifier.clone(), record_id);
        state.attributes.insert(identifier.clone(), attributes.clone());
        if state.has_fault(identifier, Fault::CreateRace) {
            return Ok(CreateResult::AlreadyExists(Some(record_id)));
        }
        Ok(CreateResult::Created(record_id))
    }

    async fn link(&self, record_id: &RecordId, target: &LinkTarget) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.link += 1;
        let identifier = state
            .identifier_of(record_id)
            .ok_or_else(|| ServiceError::NotFound(record_id.to_string()))?;
        if state.has_fault(&identifier, Fault::Link) {
            return Err(ServiceError::Backend("link rejected".to_string()));
        }
        state.links.insert((*record_id, link_key(target)));
        Ok(())
    }

    async fn grant(
        &self,
        record_id: &RecordId,
        entitlement: &Entitlement,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.grant += 1;
        let identifier = state
            .identifier_of(record_id)
            .ok_or_else(|| ServiceError::NotFound(record_id.to_string()))?;
        if state.has_fault(&identifier, Fault::Grant) {
            return Err(ServiceError::Backend("grant rejected".to_string()));
        }
        state.grants.push((*record_id, entitlement.clone()));
        Ok(())
    }
}
