//! Waldur modules for OpenStack tenant resources.
//!
//! Waldur exposes OpenStack tenants, security groups and their rules through a
//! REST API. This module holds the pieces shared by the Waldur task modules:
//!
//! - [`SecurityGroupClient`]: the operations a module needs from the API
//! - [`HttpWaldurClient`]: blocking HTTP implementation of that trait
//! - [`rules`]: rule normalization and remote-group resolution
//! - [`WaldurSecurityGroupModule`]: the `waldur_os_security_group` task module
//!
//! ## Authentication
//!
//! Every request carries `Authorization: token <access_token>`. The token and
//! API URL come from the task parameters, falling back to the `waldur` settings
//! (see [`crate::config::Settings`]).

pub mod client;
pub mod rules;
pub mod security_group;
#[cfg(test)]
mod testing;

pub use client::{HttpOptions, HttpWaldurClient};
pub use rules::{normalize_rule, normalize_rules, resolve_remote_groups, RuleSpec};
pub use security_group::{SecurityGroupConfig, SecurityGroupState, WaldurSecurityGroupModule};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Kind of object named in lookup errors
pub const TENANT: &str = "Tenant";
pub const SECURITY_GROUP: &str = "Security group";

/// Errors returned by the Waldur API client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{kind} '{identifier}' does not exist")]
    NotFound {
        kind: &'static str,
        identifier: String,
    },

    #[error("Multiple {kind} objects named '{identifier}' returned; use a UUID instead")]
    MultipleObjectsReturned {
        kind: &'static str,
        identifier: String,
    },

    #[error("Waldur API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to decode Waldur response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{kind} '{identifier}' went to Erred state")]
    Erred {
        kind: &'static str,
        identifier: String,
    },

    #[error("Timed out after {timeout:?} waiting for {kind} '{identifier}'")]
    Timeout {
        kind: &'static str,
        identifier: String,
        timeout: Duration,
    },
}

impl ClientError {
    /// Whether the error means the requested object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::NotFound { .. } | ClientError::Api { status: 404, .. }
        )
    }

    /// Whether the error means an object of `kind` is absent.
    ///
    /// A missing tenant is not a missing security group.
    pub fn is_missing(&self, kind: &str) -> bool {
        matches!(self, ClientError::NotFound { kind: k, .. } if *k == kind)
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Address family of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ethertype {
    IPv4,
    IPv6,
}

impl Ethertype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ethertype::IPv4 => "IPv4",
            Ethertype::IPv6 => "IPv6",
        }
    }
}

impl fmt::Display for Ethertype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ingress,
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// A normalized security group rule, as sent to and returned by the API.
///
/// `remote_group` holds the API URL of the referenced group once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<Ethertype>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SecurityGroupRule {
    /// Number of fields [`matches`](Self::matches) does not compare
    fn wildcard_count(&self) -> usize {
        usize::from(self.ethertype.is_none())
            + usize::from(self.description.as_deref().map_or(true, str::is_empty))
    }

    /// Whether a rule reported by the API satisfies this desired rule.
    ///
    /// Fields the desired rule leaves unset (ethertype without a cidr,
    /// description) are not compared. Empty strings from the API count as unset.
    pub fn matches(&self, remote: &SecurityGroupRule) -> bool {
        fn norm(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|s| !s.is_empty())
        }

        self.from_port == remote.from_port
            && self.to_port == remote.to_port
            && norm(&self.protocol) == norm(&remote.protocol)
            && norm(&self.cidr) == norm(&remote.cidr)
            && norm(&self.remote_group) == norm(&remote.remote_group)
            && self.direction == remote.direction
            && (self.ethertype.is_none() || self.ethertype == remote.ethertype)
            && (norm(&self.description).is_none()
                || norm(&self.description) == norm(&remote.description))
    }
}

/// Whether two rule lists are equivalent, ignoring order.
///
/// Each remote rule satisfies at most one desired rule, so duplicates count.
/// Desired rules with fewer unset fields pick their match first.
pub fn rules_match(desired: &[SecurityGroupRule], remote: &[SecurityGroupRule]) -> bool {
    if desired.len() != remote.len() {
        return false;
    }

    let mut ordered: Vec<&SecurityGroupRule> = desired.iter().collect();
    ordered.sort_by_key(|rule| rule.wildcard_count());

    let mut unmatched: Vec<&SecurityGroupRule> = remote.iter().collect();
    ordered.into_iter().all(|d| {
        match unmatched.iter().position(|r| d.matches(r)) {
            Some(index) => {
                unmatched.swap_remove(index);
                true
            }
            None => false,
        }
    })
}

/// Provisioning state of a Waldur resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    Ok,
    Erred,
    InProgress(String),
}

impl ResourceState {
    pub fn from_api_state(state: &str) -> Self {
        match state {
            "OK" => Self::Ok,
            "Erred" => Self::Erred,
            other => Self::InProgress(other.to_string()),
        }
    }
}

/// OpenStack tenant as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub url: String,
    pub uuid: String,
    #[serde(default)]
    pub name: String,
}

/// Security group as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub url: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

impl SecurityGroup {
    pub fn resource_state(&self) -> Option<ResourceState> {
        self.state.as_deref().map(ResourceState::from_api_state)
    }
}

/// Whether and how long to block until an operation completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub wait: bool,
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitOptions {
    pub const DEFAULT_INTERVAL_SECS: u64 = 20;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    pub fn no_wait() -> Self {
        Self {
            wait: false,
            ..Self::default()
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            wait: true,
            interval: Duration::from_secs(Self::DEFAULT_INTERVAL_SECS),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Everything needed to create a security group in a tenant
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSecurityGroup {
    pub project: Option<String>,
    pub tenant: String,
    pub name: String,
    pub description: Option<String>,
    pub rules: Vec<SecurityGroupRule>,
    pub tags: Option<Vec<String>>,
    pub wait: WaitOptions,
}

/// Operations the security group module consumes from the Waldur API.
pub trait SecurityGroupClient {
    /// Look up a security group in a tenant by UUID or exact name.
    fn get_security_group(&self, tenant: &str, identifier: &str) -> ClientResult<SecurityGroup>;

    /// Like [`get_security_group`](Self::get_security_group), but a missing group
    /// is not an error. A missing tenant still is.
    fn find_security_group(
        &self,
        tenant: &str,
        identifier: &str,
    ) -> ClientResult<Option<SecurityGroup>> {
        match self.get_security_group(tenant, identifier) {
            Ok(group) => Ok(Some(group)),
            Err(e) if e.is_missing(SECURITY_GROUP) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_security_group(&self, request: &CreateSecurityGroup) -> ClientResult<SecurityGroup>;

    fn update_security_group_description(
        &self,
        group: &SecurityGroup,
        description: &str,
    ) -> ClientResult<()>;

    fn update_security_group_rules(
        &self,
        group: &SecurityGroup,
        rules: &[SecurityGroupRule],
        wait: &WaitOptions,
    ) -> ClientResult<()>;

    fn delete_security_group(&self, group: &SecurityGroup, wait: &WaitOptions)
        -> ClientResult<()>;
}
