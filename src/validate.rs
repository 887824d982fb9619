use anyhow::{bail, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::StackConfig;
use crate::stack::{
    OUTPUT_API_ADDRESS, OUTPUT_BUCKET_NAME, OUTPUT_DB_ADDRESS, OUTPUT_LB_ADDRESS,
};
use crate::template::{Template, PSEUDO_PARAMETERS};

/// Structural checks over the descriptor config and the synthesized
/// template. Everything the control plane would reject late, caught here:
/// dangling references, subnet/zone mismatches, ports with no matching
/// boundary rule, absent outputs. Findings are collected so one run reports
/// them all.
pub fn check(cfg: &StackConfig, t: &Template) -> Result<()> {
    let findings = collect_findings(cfg, t);
    if findings.is_empty() {
        return Ok(());
    }

    let mut msg = String::from("template validation failed:\n");
    for f in &findings {
        msg.push_str("  - ");
        msg.push_str(f);
        msg.push('\n');
    }
    bail!(msg.trim_end().to_string());
}

pub fn collect_findings(cfg: &StackConfig, t: &Template) -> Vec<String> {
    let mut findings = Vec::new();

    check_duplicate_ids(t, &mut findings);
    check_cidr(&cfg.network.cidr, &mut findings);
    check_scaling_bounds(cfg, &mut findings);
    check_subnet_counts(cfg, t, &mut findings);
    check_references(t, &mut findings);
    check_port_boundaries(t, &mut findings);
    check_outputs(t, &mut findings);

    findings
}

// -------------------- individual checks --------------------

/// A logical id written twice means the later resource silently replaced
/// the earlier one, usually a name collision between a configured alarm and
/// a synthesized one.
fn check_duplicate_ids(t: &Template, findings: &mut Vec<String>) {
    for id in t.duplicate_ids() {
        findings.push(format!(
            "logical id declared more than once, later definition replaced the earlier: {id}"
        ));
    }
}

fn check_cidr(cidr: &str, findings: &mut Vec<String>) {
    let re = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})$")
        .expect("cidr pattern");

    let Some(caps) = re.captures(cidr) else {
        findings.push(format!("network.cidr is not a valid IPv4 CIDR: {cidr}"));
        return;
    };

    for i in 1..=4 {
        let octet: u32 = caps[i].parse().unwrap_or(256);
        if octet > 255 {
            findings.push(format!("network.cidr octet out of range: {cidr}"));
            return;
        }
    }

    // Subnets are carved at the third octet, so the base block has to span it.
    let mask: u32 = caps[5].parse().unwrap_or(33);
    if !(8..=16).contains(&mask) {
        findings.push(format!(
            "network.cidr mask /{mask} is outside the supported /8../16 range"
        ));
    }
}

fn check_scaling_bounds(cfg: &StackConfig, findings: &mut Vec<String>) {
    let c = &cfg.compute;
    if !(c.min_capacity <= c.desired_capacity && c.desired_capacity <= c.max_capacity) {
        findings.push(format!(
            "compute capacity bounds must satisfy min <= desired <= max (got {}/{}/{})",
            c.min_capacity, c.desired_capacity, c.max_capacity
        ));
    }

    if c.scale_in_cpu >= c.scale_out_cpu {
        findings.push(format!(
            "scale_in_cpu ({}) must sit below scale_out_cpu ({})",
            c.scale_in_cpu, c.scale_out_cpu
        ));
    }
}

fn check_subnet_counts(cfg: &StackConfig, t: &Template, findings: &mut Vec<String>) {
    let mut public = 0usize;
    let mut private = 0usize;

    for r in t.resources().values() {
        if r.kind != "AWS::EC2::Subnet" {
            continue;
        }
        match r.properties.get("MapPublicIpOnLaunch") {
            Some(Value::Bool(true)) => public += 1,
            _ => private += 1,
        }
    }

    if public < cfg.network.az_count {
        findings.push(format!(
            "public subnet count ({public}) is below the zone count ({})",
            cfg.network.az_count
        ));
    }
    if private < cfg.network.az_count {
        findings.push(format!(
            "private subnet count ({private}) is below the zone count ({})",
            cfg.network.az_count
        ));
    }
}

/// Every Ref / Fn::GetAtt / Fn::Sub placeholder / DependsOn entry must name
/// a resource declared in the same template (pseudo-parameters excepted).
fn check_references(t: &Template, findings: &mut Vec<String>) {
    let sub_placeholder = Regex::new(r"\$\{([A-Za-z0-9:]+)(?:\.[A-Za-z0-9.]+)?\}")
        .expect("sub placeholder pattern");

    let mut referenced: BTreeSet<String> = BTreeSet::new();
    for (id, r) in t.resources() {
        collect_refs(&r.properties, &sub_placeholder, &mut referenced);
        for dep in &r.depends_on {
            if !t.has_resource(dep) {
                findings.push(format!("{id}: DependsOn target does not exist: {dep}"));
            }
        }
    }
    for out in t.outputs().values() {
        collect_refs(&out.value, &sub_placeholder, &mut referenced);
    }

    for target in referenced {
        if PSEUDO_PARAMETERS.contains(&target.as_str()) {
            continue;
        }
        if !t.has_resource(&target) {
            findings.push(format!("reference to undeclared resource: {target}"));
        }
    }
}

fn collect_refs(v: &Value, sub_placeholder: &Regex, out: &mut BTreeSet<String>) {
    match v {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                out.insert(id.clone());
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(id)) = parts.first() {
                    out.insert(id.clone());
                }
            }
            if let Some(Value::String(expr)) = map.get("Fn::Sub") {
                for caps in sub_placeholder.captures_iter(expr) {
                    out.insert(caps[1].to_string());
                }
            }
            for val in map.values() {
                collect_refs(val, sub_placeholder, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, sub_placeholder, out);
            }
        }
        _ => {}
    }
}

/// Every port a listener, target group, or database declares has to be
/// admitted by some traffic-boundary rule.
fn check_port_boundaries(t: &Template, findings: &mut Vec<String>) {
    let mut admitted: BTreeSet<u64> = BTreeSet::new();

    for r in t.resources().values() {
        if r.kind != "AWS::EC2::SecurityGroup" {
            continue;
        }
        if let Some(Value::Array(rules)) = r.properties.get("SecurityGroupIngress") {
            for rule in rules {
                let from = rule.get("FromPort").and_then(Value::as_u64);
                let to = rule.get("ToPort").and_then(Value::as_u64);
                if let (Some(from), Some(to)) = (from, to) {
                    admitted.extend(from..=to);
                }
            }
        }
    }

    for (id, r) in t.resources() {
        let port = match r.kind.as_str() {
            "AWS::ElasticLoadBalancingV2::Listener"
            | "AWS::ElasticLoadBalancingV2::TargetGroup" => {
                r.properties.get("Port").and_then(Value::as_u64)
            }
            "AWS::RDS::DBInstance" => r
                .properties
                .get("Port")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            _ => None,
        };

        if let Some(port) = port {
            if !admitted.contains(&port) {
                findings.push(format!(
                    "{id}: port {port} has no matching security group rule"
                ));
            }
        }
    }
}

fn check_outputs(t: &Template, findings: &mut Vec<String>) {
    for label in [
        OUTPUT_LB_ADDRESS,
        OUTPUT_API_ADDRESS,
        OUTPUT_BUCKET_NAME,
        OUTPUT_DB_ADDRESS,
    ] {
        if !t.outputs().contains_key(label) {
            findings.push(format!("required output label missing: {label}"));
        }
    }
}
