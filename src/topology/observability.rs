use anyhow::Result;
use serde_json::{json, Value};

use crate::config::{AlarmConfig, ObservabilityConfig};
use crate::context::DeployContext;
use crate::resolve::Resolver;
use crate::template::{sub, Template};

use super::compute::AUTO_SCALING_GROUP;
use super::database::DB_INSTANCE;
use super::routing::LOAD_BALANCER;

pub const DASHBOARD: &str = "Dashboard";

/// Logical id for a named alarm: strip to alphanumerics, PascalCase on the
/// separators, suffix `Alarm`.
pub fn alarm_logical_id(name: &str) -> String {
    let mut out = String::new();
    let mut upper_next = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if upper_next {
                out.extend(ch.to_uppercase());
                upper_next = false;
            } else {
                out.push(ch);
            }
        } else {
            upper_next = true;
        }
    }
    out.push_str("Alarm");
    out
}

/// Observability record: dashboard name plus the alarm
/// metric/threshold/evaluation-period triples.
#[derive(Debug, Clone)]
pub struct ObservabilitySpec {
    pub dashboard_name: String,
    pub alarms: Vec<AlarmConfig>,
}

impl ObservabilitySpec {
    pub fn from_config(ctx: &DeployContext, cfg: &ObservabilityConfig) -> Result<Self> {
        let r = Resolver::new(ctx);
        let mut alarms = Vec::with_capacity(cfg.alarms.len());
        for a in &cfg.alarms {
            let mut resolved = a.clone();
            resolved.name = r.resolve(&a.name)?;
            alarms.push(resolved);
        }

        Ok(Self {
            dashboard_name: r.resolve(&cfg.dashboard_name)?,
            alarms,
        })
    }

    pub fn synthesize(&self, t: &mut Template) {
        for alarm in &self.alarms {
            let logical_id = alarm_logical_id(&alarm.name);
            let mut props = json!({
                "AlarmName": alarm.name,
                "Namespace": alarm.namespace,
                "MetricName": alarm.metric,
                "Statistic": statistic_for(&alarm.namespace, &alarm.metric),
                "Period": alarm.period_secs,
                "EvaluationPeriods": alarm.evaluation_periods,
                "Threshold": alarm.threshold,
                "ComparisonOperator": alarm.comparison.as_operator(),
                "TreatMissingData": "notBreaching",
            });

            if let Some(dims) = dimensions_for(&alarm.namespace) {
                props["Dimensions"] = dims;
            }

            t.add_resource(&logical_id, "AWS::CloudWatch::Alarm", props);
        }

        t.add_resource(
            DASHBOARD,
            "AWS::CloudWatch::Dashboard",
            json!({
                "DashboardName": self.dashboard_name,
                "DashboardBody": sub(&dashboard_body()),
            }),
        );
    }
}

/// Counts want Sum; everything else averages.
fn statistic_for(_namespace: &str, metric: &str) -> &'static str {
    if metric.contains("Count") {
        "Sum"
    } else {
        "Average"
    }
}

/// Known namespaces get pinned to the stack's own resource; anything else
/// alarms on the whole namespace.
fn dimensions_for(namespace: &str) -> Option<Value> {
    match namespace {
        "AWS/ApplicationELB" => Some(json!([{
            "Name": "LoadBalancer",
            "Value": { "Fn::GetAtt": [LOAD_BALANCER, "LoadBalancerFullName"] },
        }])),
        "AWS/RDS" => Some(json!([{
            "Name": "DBInstanceIdentifier",
            "Value": { "Ref": DB_INSTANCE },
        }])),
        "AWS/AutoScaling" | "AWS/EC2" => Some(json!([{
            "Name": "AutoScalingGroupName",
            "Value": { "Ref": AUTO_SCALING_GROUP },
        }])),
        _ => None,
    }
}

/// Dashboard body as an Fn::Sub string so widget metrics can name the
/// stack's resources without a second resolution pass.
fn dashboard_body() -> String {
    let body = json!({
        "widgets": [
            {
                "type": "metric",
                "x": 0, "y": 0, "width": 12, "height": 6,
                "properties": {
                    "title": "Request count",
                    "region": "${AWS::Region}",
                    "stat": "Sum",
                    "metrics": [[
                        "AWS/ApplicationELB", "RequestCount",
                        "LoadBalancer", "${LoadBalancer.LoadBalancerFullName}"
                    ]],
                },
            },
            {
                "type": "metric",
                "x": 12, "y": 0, "width": 12, "height": 6,
                "properties": {
                    "title": "Fleet CPU",
                    "region": "${AWS::Region}",
                    "stat": "Average",
                    "metrics": [[
                        "AWS/EC2", "CPUUtilization",
                        "AutoScalingGroupName", "${AppAutoScalingGroup}"
                    ]],
                },
            },
            {
                "type": "metric",
                "x": 0, "y": 6, "width": 12, "height": 6,
                "properties": {
                    "title": "Database CPU",
                    "region": "${AWS::Region}",
                    "stat": "Average",
                    "metrics": [[
                        "AWS/RDS", "CPUUtilization",
                        "DBInstanceIdentifier", "${Database}"
                    ]],
                },
            },
            {
                "type": "metric",
                "x": 12, "y": 6, "width": 12, "height": 6,
                "properties": {
                    "title": "Target 5xx",
                    "region": "${AWS::Region}",
                    "stat": "Sum",
                    "metrics": [[
                        "AWS/ApplicationELB", "HTTPCode_ELB_5XX_Count",
                        "LoadBalancer", "${LoadBalancer.LoadBalancerFullName}"
                    ]],
                },
            },
        ],
    });

    body.to_string()
}
