//! Shared test utilities and fixtures for the waldur-os test suite.
//!
//! This module provides:
//! - An in-memory [`FakeWaldur`] implementing `SecurityGroupClient`
//! - Builders for API objects and module parameters
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::json;

use waldur_os::modules::cloud::waldur::{
    ClientError, ClientResult, CreateSecurityGroup, SecurityGroup, SecurityGroupClient,
    SecurityGroupRule, WaitOptions, SECURITY_GROUP,
};
use waldur_os::modules::ModuleParams;

// ============================================================================
// Fake Waldur API
// ============================================================================

/// A mutating call received by [`FakeWaldur`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(CreateSecurityGroup),
    UpdateDescription {
        group: String,
        description: String,
    },
    UpdateRules {
        group: String,
        rules: Vec<SecurityGroupRule>,
    },
    Delete(String),
}

/// In-memory Waldur holding the security groups of any tenant.
///
/// Lookups match on name or UUID. Mutating calls are recorded and applied so
/// a second run sees the effect of the first.
#[derive(Default)]
pub struct FakeWaldur {
    groups: Mutex<Vec<SecurityGroup>>,
    calls: Mutex<Vec<Call>>,
    lookups: Mutex<Vec<String>>,
    fail_with: Mutex<Option<ClientError>>,
}

impl FakeWaldur {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing security group
    pub fn with_group(self, group: SecurityGroup) -> Self {
        self.groups.lock().push(group);
        self
    }

    /// Make every mutating call fail with `error`
    pub fn failing_with(self, error: ClientError) -> Self {
        *self.fail_with.lock() = Some(error);
        self
    }

    /// Mutating calls received so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Identifiers looked up so far
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }

    fn record(&self, call: Call) -> ClientResult<()> {
        self.calls.lock().push(call);
        match self.fail_with.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn update_group(&self, url: &str, update: impl FnOnce(&mut SecurityGroup)) {
        if let Some(group) = self.groups.lock().iter_mut().find(|g| g.url == url) {
            update(group);
        }
    }
}

impl SecurityGroupClient for FakeWaldur {
    fn get_security_group(&self, _tenant: &str, identifier: &str) -> ClientResult<SecurityGroup> {
        self.lookups.lock().push(identifier.to_string());

        let groups = self.groups.lock();
        let matching: Vec<_> = groups
            .iter()
            .filter(|g| g.name == identifier || g.uuid == identifier)
            .collect();

        match matching.as_slice() {
            [] => Err(ClientError::NotFound {
                kind: SECURITY_GROUP,
                identifier: identifier.to_string(),
            }),
            [group] => Ok((*group).clone()),
            _ => Err(ClientError::MultipleObjectsReturned {
                kind: SECURITY_GROUP,
                identifier: identifier.to_string(),
            }),
        }
    }

    fn create_security_group(&self, request: &CreateSecurityGroup) -> ClientResult<SecurityGroup> {
        self.record(Call::Create(request.clone()))?;

        let group = SecurityGroup {
            description: request.description.clone(),
            rules: request.rules.clone(),
            ..security_group(&request.name)
        };
        self.groups.lock().push(group.clone());
        Ok(group)
    }

    fn update_security_group_description(
        &self,
        group: &SecurityGroup,
        description: &str,
    ) -> ClientResult<()> {
        self.record(Call::UpdateDescription {
            group: group.name.clone(),
            description: description.to_string(),
        })?;
        self.update_group(&group.url, |g| g.description = Some(description.to_string()));
        Ok(())
    }

    fn update_security_group_rules(
        &self,
        group: &SecurityGroup,
        rules: &[SecurityGroupRule],
        _wait: &WaitOptions,
    ) -> ClientResult<()> {
        self.record(Call::UpdateRules {
            group: group.name.clone(),
            rules: rules.to_vec(),
        })?;
        self.update_group(&group.url, |g| g.rules = rules.to_vec());
        Ok(())
    }

    fn delete_security_group(&self, group: &SecurityGroup, _wait: &WaitOptions) -> ClientResult<()> {
        self.record(Call::Delete(group.name.clone()))?;
        self.groups.lock().retain(|g| g.url != group.url);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A security group in state OK with no rules
pub fn security_group(name: &str) -> SecurityGroup {
    SecurityGroup {
        url: format!("api/openstack-security-groups/{}/", name),
        uuid: format!("uuid-{}", name),
        name: name.to_string(),
        description: None,
        state: Some("OK".to_string()),
        tenant: Some("api/openstack-tenants/tenant/".to_string()),
        rules: Vec::new(),
    }
}

/// Module parameters for a security group task in tenant "tenant"
pub fn params(name: &str, rules: serde_json::Value) -> ModuleParams {
    let mut params = ModuleParams::new();
    params.insert("api_url".to_string(), json!("https://waldur.example.com/api/"));
    params.insert("access_token".to_string(), json!("token"));
    params.insert("tenant".to_string(), json!("tenant"));
    params.insert("name".to_string(), json!(name));
    params.insert("rules".to_string(), rules);
    params
}

/// Builder-style helper for adding one parameter
pub fn with_param(mut params: ModuleParams, key: &str, value: serde_json::Value) -> ModuleParams {
    params.insert(key.to_string(), value);
    params
}
