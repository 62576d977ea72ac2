#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use portal_provisioning::app::app;
use portal_provisioning::auth::{generate_jwt, Claims};
use portal_provisioning::config;
use portal_provisioning::provisioning::{
    CreateResult, Entitlement, ExistingRecord, Identifier, LinkTarget, Lookup,
    ProvisioningService, RecordAttributes, RecordId, ServiceError,
};
use portal_provisioning::services::TraineeRoster;
use portal_provisioning::state::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";

/// In-memory stand-in for the portal database
#[derive(Default)]
pub struct StubService {
    records: Mutex<HashMap<String, RecordId>>,
    attributes: Mutex<HashMap<String, RecordAttributes>>,
    links: Mutex<Vec<(RecordId, LinkTarget)>>,
    grants: Mutex<Vec<(RecordId, Entitlement)>>,
    failing: Mutex<Vec<String>>,
}

impl StubService {
    pub fn with_existing(emails: &[&str]) -> Self {
        let stub = Self::default();
        {
            let mut records = stub.records.lock().unwrap();
            for email in emails {
                records.insert(email.to_string(), RecordId::new_v4());
            }
        }
        stub
    }

    /// Make `create` fail for this identifier
    pub fn fail_on(self, email: &str) -> Self {
        self.failing.lock().unwrap().push(email.to_string());
        self
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn grant_count(&self) -> usize {
        self.grants.lock().unwrap().len()
    }

    pub fn grants(&self) -> Vec<Entitlement> {
        self.grants.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Attributes passed to `create` for this email
    pub fn attributes_of(&self, email: &str) -> Option<RecordAttributes> {
        self.attributes.lock().unwrap().get(email).cloned()
    }
}

#[async_trait]
impl ProvisioningService for StubService {
    async fn lookup(
        &self,
        identifier: &Identifier,
        target: Option<&LinkTarget>,
    ) -> Result<Lookup, ServiceError> {
        let Some(record_id) = self.records.lock().unwrap().get(identifier.as_str()).copied()
        else {
            return Ok(Lookup::NotFound);
        };
        let linked = match target {
            Some(target) => {
                let links = self.links.lock().unwrap();
                links.iter().any(|(id, t)| *id == record_id && t == target)
            }
            None => true,
        };
        Ok(Lookup::Existing(ExistingRecord { record_id, linked }))
    }

    async fn create(
        &self,
        identifier: &Identifier,
        attributes: &RecordAttributes,
    ) -> Result<CreateResult, ServiceError> {
        if self.failing.lock().unwrap().iter().any(|e| e == identifier.as_str()) {
            return Err(ServiceError::Backend("insert rejected".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.get(identifier.as_str()) {
            return Ok(CreateResult::AlreadyExists(Some(*existing)));
        }
        let record_id = RecordId::new_v4();
        records.insert(identifier.as_str().to_string(), record_id);
        self.attributes
            .lock()
            .unwrap()
            .insert(identifier.as_str().to_string(), attributes.clone());
        Ok(CreateResult::Created(record_id))
    }

    async fn link(&self, record_id: &RecordId, target: &LinkTarget) -> Result<(), ServiceError> {
        self.links.lock().unwrap().push((*record_id, target.clone()));
        Ok(())
    }

    async fn grant(
        &self,
        record_id: &RecordId,
        entitlement: &Entitlement,
    ) -> Result<(), ServiceError> {
        self.grants.lock().unwrap().push((*record_id, entitlement.clone()));
        Ok(())
    }
}

/// Pending trainees returned for any batch, plus a log of touched batches
#[derive(Default)]
pub struct StubRoster {
    pub pending: Vec<(Uuid, String)>,
    touched: Mutex<Vec<Uuid>>,
}

impl StubRoster {
    pub fn with_pending(emails: &[&str]) -> Self {
        Self {
            pending: emails.iter().map(|e| (Uuid::new_v4(), e.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn trainee_id(&self, email: &str) -> Uuid {
        self.pending
            .iter()
            .find(|(_, e)| e == email)
            .map(|(id, _)| *id)
            .expect("unknown trainee")
    }

    pub fn touched(&self) -> Vec<Uuid> {
        self.touched.lock().unwrap().clone()
    }
}

#[async_trait]
impl TraineeRoster for StubRoster {
    async fn pending_emails(
        &self,
        _batch_id: Uuid,
        trainee_ids: Option<&[Uuid]>,
    ) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .pending
            .iter()
            .filter(|(id, _)| trainee_ids.map_or(true, |ids| ids.contains(id)))
            .map(|(_, email)| email.clone())
            .collect())
    }

    async fn touch_batch(&self, batch_id: Uuid) -> Result<(), ServiceError> {
        self.touched.lock().unwrap().push(batch_id);
        Ok(())
    }
}

pub fn test_state(service: Arc<StubService>, roster: Arc<StubRoster>) -> AppState {
    let mut state = AppState::new(service, roster, config::config());
    state.jwt_secret = Arc::from(TEST_SECRET);
    state
}

pub fn test_app(service: Arc<StubService>, roster: StubRoster) -> Router {
    app(test_state(service, Arc::new(roster)))
}

pub fn token_for(role: &str) -> String {
    let claims = Claims::new(Uuid::new_v4(), format!("{}@portal.test", role), role.to_string());
    generate_jwt(&claims, TEST_SECRET).expect("failed to sign test token")
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).expect("failed to build request")
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router error");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
