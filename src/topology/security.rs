use serde_json::{json, Value};

use crate::config::StackConfig;
use crate::template::{r#ref, Template};

use super::network::VPC;

pub const ALB_SG: &str = "AlbSecurityGroup";
pub const APP_SG: &str = "AppSecurityGroup";
pub const DB_SG: &str = "DbSecurityGroup";
pub const TASK_SG: &str = "TaskSecurityGroup";

/// Where an inbound rule accepts traffic from.
#[derive(Debug, Clone)]
pub enum RuleSource {
    Cidr(String),
    Group(&'static str),
}

/// One traffic-boundary rule, keyed by port and source.
#[derive(Debug, Clone)]
pub struct Rule {
    pub port: u16,
    pub source: RuleSource,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SecurityGroupSpec {
    pub logical_id: &'static str,
    pub description: String,
    pub ingress: Vec<Rule>,
}

impl SecurityGroupSpec {
    pub fn synthesize(&self, t: &mut Template) {
        let ingress: Vec<Value> = self
            .ingress
            .iter()
            .map(|rule| {
                let mut entry = json!({
                    "IpProtocol": "tcp",
                    "FromPort": rule.port,
                    "ToPort": rule.port,
                    "Description": rule.description,
                });
                match &rule.source {
                    RuleSource::Cidr(cidr) => {
                        entry["CidrIp"] = json!(cidr);
                    }
                    RuleSource::Group(id) => {
                        entry["SourceSecurityGroupId"] = r#ref(id);
                    }
                }
                entry
            })
            .collect();

        t.add_resource(
            self.logical_id,
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": self.description,
                "VpcId": r#ref(VPC),
                "SecurityGroupIngress": ingress,
                "SecurityGroupEgress": [{
                    "IpProtocol": "-1",
                    "CidrIp": "0.0.0.0/0",
                    "Description": "all outbound",
                }],
            }),
        );
    }
}

/// The four boundaries and how they chain: world → load balancer →
/// instances → database, with container tasks granted the same database
/// access as the instances.
pub fn security_groups(cfg: &StackConfig) -> Vec<SecurityGroupSpec> {
    vec![
        SecurityGroupSpec {
            logical_id: ALB_SG,
            description: "load balancer: public listener".to_string(),
            ingress: vec![Rule {
                port: cfg.routing.listener_port,
                source: RuleSource::Cidr("0.0.0.0/0".to_string()),
                description: "public http".to_string(),
            }],
        },
        SecurityGroupSpec {
            logical_id: APP_SG,
            description: "backend instances: traffic from the load balancer only".to_string(),
            ingress: vec![Rule {
                port: cfg.compute.app_port,
                source: RuleSource::Group(ALB_SG),
                description: "app port from alb".to_string(),
            }],
        },
        SecurityGroupSpec {
            logical_id: TASK_SG,
            description: "container tasks: no inbound".to_string(),
            ingress: Vec::new(),
        },
        SecurityGroupSpec {
            logical_id: DB_SG,
            description: "database: app tier only".to_string(),
            ingress: vec![
                Rule {
                    port: cfg.database.port,
                    source: RuleSource::Group(APP_SG),
                    description: "db port from instances".to_string(),
                },
                Rule {
                    port: cfg.database.port,
                    source: RuleSource::Group(TASK_SG),
                    description: "db port from tasks".to_string(),
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;

    #[test]
    fn boundaries_chain_world_to_database() {
        let cfg = StackConfig::builtin();
        let groups = security_groups(&cfg);
        assert_eq!(groups.len(), 4);

        let alb = groups.iter().find(|g| g.logical_id == ALB_SG).unwrap();
        assert_eq!(alb.ingress[0].port, cfg.routing.listener_port);
        assert!(matches!(alb.ingress[0].source, RuleSource::Cidr(_)));

        let app = groups.iter().find(|g| g.logical_id == APP_SG).unwrap();
        assert_eq!(app.ingress[0].port, cfg.compute.app_port);
        assert!(matches!(app.ingress[0].source, RuleSource::Group(ALB_SG)));

        let db = groups.iter().find(|g| g.logical_id == DB_SG).unwrap();
        assert!(db.ingress.iter().all(|r| r.port == cfg.database.port));
    }

    #[test]
    fn synthesized_group_references_peer_by_id() {
        let cfg = StackConfig::builtin();
        let mut t = Template::new("test");
        for g in security_groups(&cfg) {
            g.synthesize(&mut t);
        }

        let app = t.resource(APP_SG).unwrap();
        assert_eq!(
            app.properties["SecurityGroupIngress"][0]["SourceSecurityGroupId"]["Ref"],
            ALB_SG
        );
    }
}
