//! In-memory Waldur client shared by the unit tests of this module.

use super::{
    ClientError, ClientResult, CreateSecurityGroup, SecurityGroup, SecurityGroupClient,
    SecurityGroupRule, WaitOptions, SECURITY_GROUP, TENANT,
};
use std::cell::RefCell;

/// A mutating call received by [`RecordingClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(CreateSecurityGroup),
    UpdateDescription(String),
    UpdateRules(Vec<SecurityGroupRule>),
    Delete(String),
}

/// Client serving groups of one tenant and recording mutating calls.
///
/// Mutations are applied, so later lookups see them.
pub struct RecordingClient {
    tenant: String,
    groups: RefCell<Vec<SecurityGroup>>,
    calls: RefCell<Vec<Call>>,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self {
            tenant: "tenant".to_string(),
            groups: RefCell::default(),
            calls: RefCell::default(),
        }
    }
}

impl RecordingClient {
    pub fn with_group(self, group: SecurityGroup) -> Self {
        self.groups.borrow_mut().push(group);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn update(&self, url: &str, change: impl FnOnce(&mut SecurityGroup)) {
        if let Some(group) = self.groups.borrow_mut().iter_mut().find(|g| g.url == url) {
            change(group);
        }
    }
}

/// A security group in state OK with description "descr" and no rules
pub fn group(name: &str, url: &str) -> SecurityGroup {
    SecurityGroup {
        url: url.to_string(),
        uuid: String::new(),
        name: name.to_string(),
        description: Some("descr".to_string()),
        state: Some("OK".to_string()),
        tenant: None,
        rules: Vec::new(),
    }
}

impl SecurityGroupClient for RecordingClient {
    fn get_security_group(&self, tenant: &str, identifier: &str) -> ClientResult<SecurityGroup> {
        if tenant != self.tenant {
            return Err(ClientError::NotFound {
                kind: TENANT,
                identifier: tenant.to_string(),
            });
        }

        self.groups
            .borrow()
            .iter()
            .find(|g| g.name == identifier)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: SECURITY_GROUP,
                identifier: identifier.to_string(),
            })
    }

    fn create_security_group(&self, request: &CreateSecurityGroup) -> ClientResult<SecurityGroup> {
        self.calls.borrow_mut().push(Call::Create(request.clone()));
        let created = SecurityGroup {
            description: request.description.clone(),
            rules: request.rules.clone(),
            ..group(&request.name, "api/new")
        };
        self.groups.borrow_mut().push(created.clone());
        Ok(created)
    }

    fn update_security_group_description(
        &self,
        group: &SecurityGroup,
        description: &str,
    ) -> ClientResult<()> {
        self.calls
            .borrow_mut()
            .push(Call::UpdateDescription(description.to_string()));
        self.update(&group.url, |g| g.description = Some(description.to_string()));
        Ok(())
    }

    fn update_security_group_rules(
        &self,
        group: &SecurityGroup,
        rules: &[SecurityGroupRule],
        _wait: &WaitOptions,
    ) -> ClientResult<()> {
        self.calls.borrow_mut().push(Call::UpdateRules(rules.to_vec()));
        self.update(&group.url, |g| g.rules = rules.to_vec());
        Ok(())
    }

    fn delete_security_group(&self, group: &SecurityGroup, _wait: &WaitOptions) -> ClientResult<()> {
        self.calls.borrow_mut().push(Call::Delete(group.name.clone()));
        self.groups.borrow_mut().retain(|g| g.url != group.url);
        Ok(())
    }
}
