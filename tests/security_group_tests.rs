//! Security group module tests
//!
//! Runs the module against an in-memory Waldur. Tests cover:
//! - Rule validation and the messages reported for invalid rules
//! - Remote group resolution
//! - Create, update, delete and idempotent re-runs
//! - Check mode and diff mode

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

use waldur_os::modules::cloud::waldur::{
    ClientError, CreateSecurityGroup, Direction, Ethertype, SecurityGroupConfig,
    SecurityGroupRule, WaitOptions, WaldurSecurityGroupModule,
};
use waldur_os::modules::{ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry};

fn run(client: &FakeWaldur, params: &ModuleParams) -> Result<ModuleOutput, ModuleError> {
    run_with(client, params, &ModuleContext::default())
}

fn run_with(
    client: &FakeWaldur,
    params: &ModuleParams,
    context: &ModuleContext,
) -> Result<ModuleOutput, ModuleError> {
    let config = SecurityGroupConfig::from_params(params)?;
    WaldurSecurityGroupModule::apply(client, &config, context)
}

fn failure_message(rule: serde_json::Value) -> String {
    let client = FakeWaldur::new();
    let err = run(&client, &params("secure-group", json!([rule]))).unwrap_err();
    assert!(client.calls().is_empty());
    err.to_string()
}

fn created(name: &str, rules: Vec<SecurityGroupRule>) -> Call {
    Call::Create(CreateSecurityGroup {
        project: None,
        tenant: "tenant".to_string(),
        name: name.to_string(),
        description: None,
        rules,
        tags: None,
        wait: WaitOptions::default(),
    })
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_security_group_creation_with_link_to_remote_group() {
    let client = FakeWaldur::new().with_group(security_group("web"));
    let params = params(
        "secure-group",
        json!([{"from_port": "80", "to_port": "80", "protocol": "tcp", "remote_group": "web"}]),
    );

    let output = run(&client, &params).unwrap();

    assert!(output.changed);
    assert_eq!(
        client.calls(),
        vec![created(
            "secure-group",
            vec![SecurityGroupRule {
                from_port: Some(80),
                to_port: Some(80),
                protocol: Some("tcp".to_string()),
                remote_group: Some("api/openstack-security-groups/web/".to_string()),
                ..Default::default()
            }]
        )]
    );
    assert_eq!(client.lookups(), vec!["web", "secure-group"]);
}

#[test]
fn test_security_group_creation_with_valid_ipv4_cidr() {
    let client = FakeWaldur::new();
    let params = params(
        "secure-group",
        json!([{"from_port": "80", "to_port": "80", "protocol": "tcp", "cidr": "192.168.0.0/28"}]),
    );

    run(&client, &params).unwrap();

    assert_eq!(
        client.calls(),
        vec![created(
            "secure-group",
            vec![SecurityGroupRule {
                from_port: Some(80),
                to_port: Some(80),
                protocol: Some("tcp".to_string()),
                cidr: Some("192.168.0.0/28".to_string()),
                ethertype: Some(Ethertype::IPv4),
                direction: Direction::Ingress,
                ..Default::default()
            }]
        )]
    );
}

#[test]
fn test_security_group_creation_with_valid_ipv6_cidr() {
    let client = FakeWaldur::new();
    let params = params(
        "secure-group",
        json!([{
            "from_port": 443, "to_port": 443, "protocol": "tcp",
            "cidr": "2001:db8::/32", "ethertype": "IPv6", "direction": "egress"
        }]),
    );

    run(&client, &params).unwrap();

    assert_eq!(
        client.calls(),
        vec![created(
            "secure-group",
            vec![SecurityGroupRule {
                from_port: Some(443),
                to_port: Some(443),
                protocol: Some("tcp".to_string()),
                cidr: Some("2001:db8::/32".to_string()),
                ethertype: Some(Ethertype::IPv6),
                direction: Direction::Egress,
                ..Default::default()
            }]
        )]
    );
}

#[test]
fn test_creation_passes_optional_fields() {
    let client = FakeWaldur::new();
    let params = with_param(
        with_param(
            with_param(params("db", json!([])), "description", json!("Databases")),
            "tags",
            json!(["db", "prod"]),
        ),
        "project",
        json!("Project X"),
    );
    let params = with_param(params, "wait", json!(false));

    run(&client, &params).unwrap();

    assert_eq!(
        client.calls(),
        vec![Call::Create(CreateSecurityGroup {
            project: Some("Project X".to_string()),
            tenant: "tenant".to_string(),
            name: "db".to_string(),
            description: Some("Databases".to_string()),
            rules: vec![],
            tags: Some(vec!["db".to_string(), "prod".to_string()]),
            wait: WaitOptions::no_wait(),
        })]
    );
}

// ============================================================================
// Rule validation
// ============================================================================

#[test]
fn test_security_group_creation_with_invalid_ipv6_cidr() {
    let message = failure_message(json!({
        "from_port": "80", "to_port": "80", "protocol": "tcp",
        "cidr": "192.168.0.0/28", "ethertype": "IPv6"
    }));
    assert_eq!(message, "Invalid IPv6 address.");
}

#[test]
fn test_security_group_creation_with_invalid_ipv4_cidr() {
    let message = failure_message(json!({
        "from_port": "80", "to_port": "80", "protocol": "tcp",
        "cidr": "2001:db8::/32", "ethertype": "IPv4"
    }));
    assert_eq!(message, "Invalid IPv4 address.");
}

#[test]
fn test_security_group_creation_with_invalid_ethertype() {
    let message = failure_message(json!({
        "from_port": "80", "to_port": "80", "protocol": "tcp",
        "cidr": "192.168.0.0/28", "ethertype": "IPv7"
    }));
    assert_eq!(message, "Invalid ethertype");
}

#[test]
fn test_security_group_creation_with_invalid_direction() {
    let message = failure_message(json!({
        "from_port": "80", "to_port": "80", "protocol": "tcp",
        "cidr": "192.168.0.0/28", "direction": "sideways"
    }));
    assert_eq!(message, "Invalid direction .");
}

#[test]
fn test_security_group_creation_without_cidr_or_remote_group() {
    let message = failure_message(json!({"from_port": "80", "to_port": "80", "protocol": "tcp"}));
    assert_eq!(message, "Either cidr or remote_group must be specified.");
}

#[test]
fn test_first_invalid_rule_fails_whole_task() {
    let client = FakeWaldur::new();
    let params = params(
        "secure-group",
        json!([
            {"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"},
            {"from_port": 80, "to_port": 80, "protocol": "tcp"}
        ]),
    );

    assert!(run(&client, &params).is_err());
    assert!(client.calls().is_empty());
    assert!(client.lookups().is_empty());
}

#[test]
fn test_registry_rejects_invalid_rule_before_contacting_api() {
    // An unreachable API URL proves validation fails first
    let params = with_param(
        params(
            "secure-group",
            json!([{"protocol": "tcp", "cidr": "10.0.0.0/8", "ethertype": "IPv6"}]),
        ),
        "api_url",
        json!("http://127.0.0.1:9/api/"),
    );

    let err = ModuleRegistry::with_builtins()
        .execute("waldur_os_security_group", &params, &ModuleContext::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid IPv6 address.");
}

#[test]
fn test_missing_remote_group_fails() {
    let client = FakeWaldur::new();
    let params = params(
        "secure-group",
        json!([{"protocol": "tcp", "remote_group": "missing"}]),
    );

    let err = run(&client, &params).unwrap_err();
    assert!(matches!(
        err,
        ModuleError::Client(ClientError::NotFound { .. })
    ));
    assert!(client.calls().is_empty());
}

// ============================================================================
// Updates and idempotency
// ============================================================================

#[test]
fn test_second_run_is_idempotent() {
    let client = FakeWaldur::new();
    let params = with_param(
        params(
            "web",
            json!([
                {"from_port": 80, "to_port": 80, "protocol": "tcp", "cidr": "0.0.0.0/0"},
                {"from_port": 443, "to_port": 443, "protocol": "tcp", "cidr": "::/0"}
            ]),
        ),
        "description",
        json!("Web servers"),
    );

    assert!(run(&client, &params).unwrap().changed);
    let second = run(&client, &params).unwrap();

    assert!(!second.changed);
    assert_eq!(client.calls().len(), 1);
    assert_eq!(second.data["security_group"]["name"], json!("web"));
}

#[test]
fn test_rule_order_does_not_matter() {
    let mut existing = security_group("web");
    existing.rules = vec![
        SecurityGroupRule {
            from_port: Some(443),
            to_port: Some(443),
            protocol: Some("tcp".to_string()),
            cidr: Some("0.0.0.0/0".to_string()),
            ethertype: Some(Ethertype::IPv4),
            ..Default::default()
        },
        SecurityGroupRule {
            from_port: Some(80),
            to_port: Some(80),
            protocol: Some("tcp".to_string()),
            cidr: Some("0.0.0.0/0".to_string()),
            ethertype: Some(Ethertype::IPv4),
            ..Default::default()
        },
    ];
    let client = FakeWaldur::new().with_group(existing);
    let params = params(
        "web",
        json!([
            {"from_port": 80, "to_port": 80, "protocol": "tcp", "cidr": "0.0.0.0/0"},
            {"from_port": 443, "to_port": 443, "protocol": "tcp", "cidr": "0.0.0.0/0"}
        ]),
    );

    let output = run(&client, &params).unwrap();
    assert!(!output.changed);
    assert!(client.calls().is_empty());
}

#[test]
fn test_changed_rules_are_replaced() {
    let client = FakeWaldur::new().with_group(security_group("web"));
    let params = params(
        "web",
        json!([{"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"}]),
    );

    let output = run(&client, &params).unwrap();

    assert!(output.changed);
    assert_eq!(
        client.calls(),
        vec![Call::UpdateRules {
            group: "web".to_string(),
            rules: vec![SecurityGroupRule {
                from_port: Some(22),
                to_port: Some(22),
                protocol: Some("tcp".to_string()),
                cidr: Some("10.0.0.0/8".to_string()),
                ethertype: Some(Ethertype::IPv4),
                ..Default::default()
            }],
        }]
    );
}

#[test]
fn test_changed_description_only() {
    let client = FakeWaldur::new().with_group(security_group("web"));
    let params = with_param(params("web", json!([])), "description", json!("Frontend"));

    let output = run(&client, &params).unwrap();

    assert!(output.changed);
    assert_eq!(
        client.calls(),
        vec![Call::UpdateDescription {
            group: "web".to_string(),
            description: "Frontend".to_string(),
        }]
    );
}

#[test]
fn test_duplicate_rules_are_counted() {
    let ssh = SecurityGroupRule {
        from_port: Some(22),
        to_port: Some(22),
        protocol: Some("tcp".to_string()),
        cidr: Some("10.0.0.0/8".to_string()),
        ethertype: Some(Ethertype::IPv4),
        ..Default::default()
    };
    let http = SecurityGroupRule {
        from_port: Some(80),
        to_port: Some(80),
        ..ssh.clone()
    };
    let mut existing = security_group("web");
    existing.rules = vec![ssh.clone(), http.clone(), http];
    let client = FakeWaldur::new().with_group(existing);
    let params = params(
        "web",
        json!([
            {"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"},
            {"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"},
            {"from_port": 80, "to_port": 80, "protocol": "tcp", "cidr": "10.0.0.0/8"}
        ]),
    );

    let output = run(&client, &params).unwrap();
    assert!(output.changed);
    assert!(matches!(client.calls().as_slice(), [Call::UpdateRules { .. }]));

    let second = run(&client, &params).unwrap();
    assert!(!second.changed);
    assert_eq!(client.calls().len(), 1);
}

#[test]
fn test_update_reports_updated_group() {
    let client = FakeWaldur::new().with_group(security_group("web"));
    let params = with_param(
        params(
            "web",
            json!([{"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"}]),
        ),
        "description",
        json!("Frontend"),
    );

    let output = run(&client, &params).unwrap();

    let data = &output.data["security_group"];
    assert_eq!(data["description"], json!("Frontend"));
    assert_eq!(data["rules"][0]["from_port"], json!(22));
}

#[test]
fn test_api_failure_is_reported() {
    let client = FakeWaldur::new().failing_with(ClientError::Api {
        status: 400,
        message: "{\"name\": [\"This field is required.\"]}".to_string(),
    });

    let err = run(&client, &params("web", json!([]))).unwrap_err();
    assert!(err.to_string().contains("This field is required."));
}

// ============================================================================
// Absent state
// ============================================================================

#[test]
fn test_absent_deletes_group() {
    let client = FakeWaldur::new().with_group(security_group("web"));
    let params = with_param(params("web", json!([])), "state", json!("absent"));

    assert!(run(&client, &params).unwrap().changed);
    assert_eq!(client.calls(), vec![Call::Delete("web".to_string())]);

    // Already gone
    assert!(!run(&client, &params).unwrap().changed);
    assert_eq!(client.calls().len(), 1);
}

#[test]
fn test_absent_ignores_rules() {
    let client = FakeWaldur::new();
    let params = with_param(
        params("web", json!([{"protocol": "tcp"}])),
        "state",
        json!("absent"),
    );

    assert!(!run(&client, &params).unwrap().changed);
}

// ============================================================================
// Check mode and diff mode
// ============================================================================

#[test]
fn test_check_mode_reports_without_changes() {
    let client = FakeWaldur::new().with_group(security_group("old"));
    let check = ModuleContext::new().with_check_mode(true);

    let create = run_with(&client, &params("new", json!([])), &check).unwrap();
    let delete = run_with(
        &client,
        &with_param(params("old", json!([])), "state", json!("absent")),
        &check,
    )
    .unwrap();

    assert!(create.changed);
    assert!(delete.changed);
    assert!(client.calls().is_empty());
}

#[test]
fn test_diff_mode_shows_rules() {
    let client = FakeWaldur::new();
    let context = ModuleContext::new().with_diff_mode(true);
    let params = params(
        "web",
        json!([{"from_port": 80, "to_port": 80, "protocol": "tcp", "cidr": "0.0.0.0/0"}]),
    );

    let output = run_with(&client, &params, &context).unwrap();
    let diff = output.diff.unwrap();

    assert_eq!(diff.before, "");
    assert!(diff.after.contains("0.0.0.0/0"));
}
