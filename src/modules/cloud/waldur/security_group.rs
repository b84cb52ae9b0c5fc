//! `waldur_os_security_group` - manage OpenStack security groups through Waldur.
//!
//! ### Parameters
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `access_token` | Yes* | Waldur API token (*or from settings) |
//! | `api_url` | Yes* | Waldur API URL (*or from settings) |
//! | `project` | No | Project name or UUID the tenant belongs to |
//! | `tenant` | Yes | Tenant name or UUID |
//! | `name` | Yes | Security group name |
//! | `description` | No | Security group description |
//! | `rules` | No | List of rules (see below) |
//! | `tags` | No | List of tags, applied when the group is created |
//! | `state` | No | present, absent (default: present) |
//! | `wait` | No | Wait until the group is ready (default: true) |
//! | `interval` | No | Seconds between polls (default: 20) |
//! | `timeout` | No | Seconds to wait before failing (default: 600) |
//! | `validate_certs` | No | Verify the API's TLS certificate (default: true) |
//! | `request_timeout` | No | Seconds before a single HTTP request fails (default: 30) |
//!
//! An existing group is brought up to date by its description and rules only;
//! `tags` and `project` are not compared once the group exists.
//!
//! Each rule takes `from_port`, `to_port`, `protocol`, either `cidr` or
//! `remote_group` (name or UUID of another group in the tenant), and optionally
//! `ethertype` (IPv4, IPv6), `direction` (ingress, egress) and `description`.
//!
//! ### Example
//!
//! ```yaml
//! - name: Open SSH and HTTPS
//!   waldur_os_security_group:
//!     access_token: b83557fd8e2066e98f27dee8f3b3433cdc4183ce
//!     api_url: https://waldur.example.com/api/
//!     tenant: VPC #1
//!     name: web
//!     description: Web servers
//!     rules:
//!       - from_port: 22
//!         to_port: 22
//!         protocol: tcp
//!         cidr: 10.0.0.0/8
//!       - from_port: 443
//!         to_port: 443
//!         protocol: tcp
//!         cidr: ::/0
//!         ethertype: IPv6
//!     tags:
//!       - web
//! ```

use super::rules::{normalize_rules, resolve_remote_groups, RuleSpec};
use super::{
    rules_match, CreateSecurityGroup, HttpOptions, HttpWaldurClient, SecurityGroup,
    SecurityGroupClient, SecurityGroupRule, WaitOptions,
};
use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use std::time::Duration;

/// Security group desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityGroupState {
    #[default]
    Present,
    Absent,
}

impl SecurityGroupState {
    fn from_str(s: &str) -> ModuleResult<Self> {
        match s.to_lowercase().as_str() {
            "present" => Ok(SecurityGroupState::Present),
            "absent" => Ok(SecurityGroupState::Absent),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid state '{}'. Valid states: present, absent",
                s
            ))),
        }
    }
}

/// Security group configuration parsed from module parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroupConfig {
    pub api_url: String,
    pub access_token: String,
    pub project: Option<String>,
    pub tenant: String,
    pub name: String,
    pub description: Option<String>,
    pub rules: Vec<RuleSpec>,
    pub tags: Option<Vec<String>>,
    pub state: SecurityGroupState,
    pub wait: WaitOptions,
    pub validate_certs: bool,
    pub request_timeout: Duration,
}

impl SecurityGroupConfig {
    pub fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let state = match params.get_string("state")? {
            Some(s) => SecurityGroupState::from_str(&s)?,
            None => SecurityGroupState::default(),
        };

        let rules = match params.get("rules") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(RuleSpec::from_value)
                .collect::<ModuleResult<Vec<_>>>()?,
            Some(_) => {
                return Err(ModuleError::InvalidParameter(
                    "rules must be a list".to_string(),
                ))
            }
        };

        let interval = params
            .get_u64("interval")?
            .unwrap_or(WaitOptions::DEFAULT_INTERVAL_SECS);
        let timeout = params
            .get_u64("timeout")?
            .unwrap_or(WaitOptions::DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            api_url: params.get_string_required("api_url")?,
            access_token: params.get_string_required("access_token")?,
            project: params.get_string("project")?,
            tenant: params.get_string_required("tenant")?,
            name: params.get_string_required("name")?,
            description: params.get_string("description")?,
            rules,
            tags: params.get_vec_string("tags")?,
            state,
            wait: WaitOptions {
                wait: params.get_bool_or("wait", true),
                interval: Duration::from_secs(interval),
                timeout: Duration::from_secs(timeout),
            },
            validate_certs: params.get_bool_or("validate_certs", true),
            request_timeout: params
                .get_u64("request_timeout")?
                .map(Duration::from_secs)
                .unwrap_or(HttpOptions::default().request_timeout),
        })
    }

    fn http_options(&self) -> HttpOptions {
        HttpOptions {
            request_timeout: self.request_timeout,
            validate_certs: self.validate_certs,
        }
    }
}

fn group_data(group: &SecurityGroup) -> ModuleResult<serde_json::Value> {
    serde_json::to_value(group).map_err(|e| {
        ModuleError::ExecutionFailed(format!("Failed to serialize security group: {}", e))
    })
}

fn describe(description: Option<&str>, rules: &[SecurityGroupRule]) -> String {
    let rules = serde_json::to_string_pretty(rules).unwrap_or_default();
    format!(
        "description: {}\nrules: {}\n",
        description.unwrap_or_default(),
        rules
    )
}

/// Waldur OpenStack security group module
pub struct WaldurSecurityGroupModule;

impl WaldurSecurityGroupModule {
    /// Bring the security group described by `config` to its desired state.
    pub fn apply(
        client: &dyn SecurityGroupClient,
        config: &SecurityGroupConfig,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        match config.state {
            SecurityGroupState::Present => Self::ensure_present(client, config, context),
            SecurityGroupState::Absent => Self::ensure_absent(client, config, context),
        }
    }

    fn ensure_present(
        client: &dyn SecurityGroupClient,
        config: &SecurityGroupConfig,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let mut rules = normalize_rules(&config.rules)?;
        resolve_remote_groups(client, &config.tenant, &mut rules)?;

        match client.find_security_group(&config.tenant, &config.name)? {
            None => Self::create(client, config, rules, context),
            Some(existing) => Self::update(client, config, &rules, existing, context),
        }
    }

    fn create(
        client: &dyn SecurityGroupClient,
        config: &SecurityGroupConfig,
        rules: Vec<SecurityGroupRule>,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let diff = Diff::new("", describe(config.description.as_deref(), &rules));

        if context.check_mode {
            let output = ModuleOutput::changed(format!(
                "Would create security group '{}'",
                config.name
            ));
            return Ok(if context.diff_mode {
                output.with_diff(diff)
            } else {
                output
            });
        }

        let request = CreateSecurityGroup {
            project: config.project.clone(),
            tenant: config.tenant.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            rules,
            tags: config.tags.clone(),
            wait: config.wait,
        };
        let group = client.create_security_group(&request)?;

        let output = ModuleOutput::changed(format!("Created security group '{}'", config.name))
            .with_data("security_group", group_data(&group)?);
        Ok(if context.diff_mode {
            output.with_diff(diff)
        } else {
            output
        })
    }

    fn update(
        client: &dyn SecurityGroupClient,
        config: &SecurityGroupConfig,
        rules: &[SecurityGroupRule],
        existing: SecurityGroup,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let current_description = existing.description.as_deref().unwrap_or_default();
        let new_description = config
            .description
            .as_deref()
            .filter(|d| *d != current_description);
        let rules_changed = !rules_match(rules, &existing.rules);

        if new_description.is_none() && !rules_changed {
            return Ok(ModuleOutput::ok(format!(
                "Security group '{}' is up to date",
                config.name
            ))
            .with_data("security_group", group_data(&existing)?));
        }

        let diff = Diff::new(
            describe(existing.description.as_deref(), &existing.rules),
            describe(
                config.description.as_deref().or(existing.description.as_deref()),
                rules,
            ),
        );

        if context.check_mode {
            let output = ModuleOutput::changed(format!(
                "Would update security group '{}'",
                config.name
            ))
            .with_data("security_group", group_data(&existing)?);
            return Ok(if context.diff_mode {
                output.with_diff(diff)
            } else {
                output
            });
        }

        if let Some(description) = new_description {
            client.update_security_group_description(&existing, description)?;
        }
        if rules_changed {
            client.update_security_group_rules(&existing, rules, &config.wait)?;
        }

        let updated = client.get_security_group(&config.tenant, &existing.name)?;
        let output = ModuleOutput::changed(format!("Updated security group '{}'", config.name))
            .with_data("security_group", group_data(&updated)?);
        Ok(if context.diff_mode {
            output.with_diff(diff)
        } else {
            output
        })
    }

    fn ensure_absent(
        client: &dyn SecurityGroupClient,
        config: &SecurityGroupConfig,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let Some(existing) = client.find_security_group(&config.tenant, &config.name)? else {
            return Ok(ModuleOutput::ok(format!(
                "Security group '{}' does not exist",
                config.name
            )));
        };

        if context.check_mode {
            return Ok(ModuleOutput::changed(format!(
                "Would delete security group '{}'",
                config.name
            )));
        }

        client.delete_security_group(&existing, &config.wait)?;
        Ok(ModuleOutput::changed(format!(
            "Deleted security group '{}'",
            config.name
        )))
    }
}

impl Module for WaldurSecurityGroupModule {
    fn name(&self) -> &'static str {
        "waldur_os_security_group"
    }

    fn description(&self) -> &'static str {
        "Create, update, and delete OpenStack security groups through Waldur"
    }

    fn required_params(&self) -> &[&'static str] {
        &["access_token", "api_url", "tenant", "name"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let config = SecurityGroupConfig::from_params(params)?;
        if config.state == SecurityGroupState::Present {
            normalize_rules(&config.rules)?;
        }
        if config.wait.interval.is_zero() {
            return Err(ModuleError::InvalidParameter(
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let config = SecurityGroupConfig::from_params(params)?;
        let client = HttpWaldurClient::with_options(
            &config.api_url,
            config.access_token.as_str(),
            &config.http_options(),
        )?;

        Self::apply(&client, &config, context)
    }
}
