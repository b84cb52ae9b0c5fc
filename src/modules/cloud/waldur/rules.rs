//! Security group rule normalization.
//!
//! Rules arrive from the task as loosely-typed mappings. [`normalize_rule`]
//! turns one into a [`SecurityGroupRule`] the API accepts:
//!
//! 1. exactly one of `cidr` / `remote_group` must be given
//! 2. with a `cidr`, the ethertype is inferred from its address family, or the
//!    declared ethertype must match that family
//! 3. the ethertype, when given, must be `IPv4` or `IPv6`
//! 4. the direction defaults to `ingress` and must be `ingress` or `egress`
//!
//! [`resolve_remote_groups`] then replaces remote group names with the API URL
//! of the group they name.

use super::{Direction, Ethertype, SecurityGroupClient, SecurityGroupRule};
use crate::modules::cloud::waldur::ClientResult;
use crate::modules::{ModuleError, ModuleResult};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MISSING_TARGET: &str = "Either cidr or remote_group must be specified.";
pub const CONFLICTING_TARGET: &str = "Either cidr or remote_group must be specified, not both.";
pub const INVALID_IPV4: &str = "Invalid IPv4 address.";
pub const INVALID_IPV6: &str = "Invalid IPv6 address.";
pub const INVALID_ETHERTYPE: &str = "Invalid ethertype";
pub const INVALID_DIRECTION: &str = "Invalid direction .";

/// Lowest and highest port numbers accepted; -1 means "any" for ICMP and
/// protocol-less rules.
const PORT_RANGE: std::ops::RangeInclusive<i64> = -1..=65535;

/// A port given either as a number or as a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
}

/// A rule exactly as written in the task parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub from_port: Option<PortValue>,
    pub to_port: Option<PortValue>,
    pub protocol: Option<String>,
    pub cidr: Option<String>,
    pub remote_group: Option<String>,
    pub ethertype: Option<String>,
    pub direction: Option<String>,
    pub description: Option<String>,
}

impl RuleSpec {
    /// Parse a single rule mapping
    pub fn from_value(value: &serde_json::Value) -> ModuleResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ModuleError::InvalidParameter(format!("Invalid rule {}: {}", value, e)))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_port(field: &str, value: &Option<PortValue>) -> ModuleResult<Option<i32>> {
    let port = match value {
        None => return Ok(None),
        Some(PortValue::Number(n)) => *n,
        Some(PortValue::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(PortValue::Text(s)) => s.trim().parse::<i64>().map_err(|_| {
            ModuleError::Validation(format!("Invalid {} value '{}'.", field, s))
        })?,
    };

    if !PORT_RANGE.contains(&port) {
        return Err(ModuleError::Validation(format!(
            "Invalid {} value '{}'. Ports must be between -1 and 65535.",
            field, port
        )));
    }

    i32::try_from(port)
        .map(Some)
        .map_err(|_| ModuleError::Validation(format!("Invalid {} value '{}'.", field, port)))
}

/// Work out the ethertype of a rule, checking it against the cidr if any.
fn resolve_ethertype(cidr: Option<&str>, declared: Option<&str>) -> ModuleResult<Option<Ethertype>> {
    let network = cidr.map(IpNetwork::from_str);

    match (declared, network) {
        (None, None) => Ok(None),
        (None, Some(Ok(IpNetwork::V4(_)))) => Ok(Some(Ethertype::IPv4)),
        (None, Some(Ok(IpNetwork::V6(_)))) => Ok(Some(Ethertype::IPv6)),
        (None, Some(Err(_))) => Err(ModuleError::Validation(format!(
            "Invalid cidr {}.",
            cidr.unwrap_or_default()
        ))),
        (Some("IPv4"), None | Some(Ok(IpNetwork::V4(_)))) => Ok(Some(Ethertype::IPv4)),
        (Some("IPv4"), Some(_)) => Err(ModuleError::Validation(INVALID_IPV4.to_string())),
        (Some("IPv6"), None | Some(Ok(IpNetwork::V6(_)))) => Ok(Some(Ethertype::IPv6)),
        (Some("IPv6"), Some(_)) => Err(ModuleError::Validation(INVALID_IPV6.to_string())),
        (Some(_), _) => Err(ModuleError::Validation(INVALID_ETHERTYPE.to_string())),
    }
}

fn resolve_direction(direction: Option<&str>) -> ModuleResult<Direction> {
    match direction {
        None => Ok(Direction::default()),
        Some("ingress") => Ok(Direction::Ingress),
        Some("egress") => Ok(Direction::Egress),
        Some(_) => Err(ModuleError::Validation(INVALID_DIRECTION.to_string())),
    }
}

/// Validate one rule and fill in inferred fields.
pub fn normalize_rule(spec: &RuleSpec) -> ModuleResult<SecurityGroupRule> {
    let cidr = non_empty(&spec.cidr);
    let remote_group = non_empty(&spec.remote_group);

    match (cidr, remote_group) {
        (None, None) => return Err(ModuleError::Validation(MISSING_TARGET.to_string())),
        (Some(_), Some(_)) => {
            return Err(ModuleError::Validation(CONFLICTING_TARGET.to_string()))
        }
        _ => {}
    }

    let ethertype = resolve_ethertype(cidr, non_empty(&spec.ethertype))?;
    let direction = resolve_direction(non_empty(&spec.direction))?;

    Ok(SecurityGroupRule {
        from_port: parse_port("from_port", &spec.from_port)?,
        to_port: parse_port("to_port", &spec.to_port)?,
        protocol: non_empty(&spec.protocol).map(str::to_string),
        cidr: cidr.map(str::to_string),
        remote_group: remote_group.map(str::to_string),
        ethertype,
        direction,
        description: non_empty(&spec.description).map(str::to_string),
    })
}

/// Normalize every rule, stopping at the first invalid one.
pub fn normalize_rules(specs: &[RuleSpec]) -> ModuleResult<Vec<SecurityGroupRule>> {
    specs.iter().map(normalize_rule).collect()
}

/// Replace remote group names with the URL of the group they name in `tenant`.
///
/// Every reference costs one lookup; a missing group fails the whole call.
pub fn resolve_remote_groups<C>(
    client: &C,
    tenant: &str,
    rules: &mut [SecurityGroupRule],
) -> ClientResult<()>
where
    C: SecurityGroupClient + ?Sized,
{
    for rule in rules.iter_mut() {
        if let Some(name) = rule.remote_group.as_deref() {
            let group = client.get_security_group(tenant, name)?;
            tracing::debug!("Resolved remote group '{}' to {}", name, group.url);
            rule.remote_group = Some(group.url);
        }
    }
    Ok(())
}
