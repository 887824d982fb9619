use serde_json::json;

use crate::config::ContainerConfig;
use crate::template::{get_att, r#ref, Template};

use super::iam::{TASK_EXECUTION_ROLE, TASK_ROLE};
use super::network::NetworkSpec;
use super::security::TASK_SG;
use super::storage::BUCKET;

pub const CLUSTER: &str = "Cluster";
pub const LOG_GROUP: &str = "AgentLogGroup";
pub const TASK_DEFINITION: &str = "AgentTaskDefinition";
pub const SERVICE: &str = "AgentService";

/// Container task record: resource limits, image reference, log
/// destination, desired replica count. Runs the download agent on Fargate
/// in the private subnets.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub desired_count: u32,
    pub log_retention_days: u32,
    pub subnet_ids: Vec<String>,
    pub name: String,
}

impl ContainerSpec {
    pub fn from_config(cfg: &ContainerConfig, network: &NetworkSpec, name: String) -> Self {
        Self {
            image: cfg.image.clone(),
            cpu: cfg.cpu,
            memory_mib: cfg.memory_mib,
            desired_count: cfg.desired_count,
            log_retention_days: cfg.log_retention_days,
            subnet_ids: network.private_subnet_ids(),
            name,
        }
    }

    pub fn synthesize(&self, t: &mut Template) {
        t.add_resource(
            CLUSTER,
            "AWS::ECS::Cluster",
            json!({ "ClusterName": self.name }),
        );

        t.add_resource(
            LOG_GROUP,
            "AWS::Logs::LogGroup",
            json!({ "RetentionInDays": self.log_retention_days }),
        );

        t.add_resource(
            TASK_DEFINITION,
            "AWS::ECS::TaskDefinition",
            json!({
                "RequiresCompatibilities": ["FARGATE"],
                "NetworkMode": "awsvpc",
                "Cpu": self.cpu.to_string(),
                "Memory": self.memory_mib.to_string(),
                "TaskRoleArn": get_att(TASK_ROLE, "Arn"),
                "ExecutionRoleArn": get_att(TASK_EXECUTION_ROLE, "Arn"),
                "ContainerDefinitions": [{
                    "Name": "agent",
                    "Image": self.image,
                    "Essential": true,
                    "Environment": [
                        { "Name": "ASSETS_BUCKET", "Value": r#ref(BUCKET) },
                    ],
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": r#ref(LOG_GROUP),
                            "awslogs-region": r#ref("AWS::Region"),
                            "awslogs-stream-prefix": "agent",
                        },
                    },
                }],
            }),
        );

        let subnet_refs: Vec<_> = self.subnet_ids.iter().map(|id| r#ref(id)).collect();
        t.add_resource(
            SERVICE,
            "AWS::ECS::Service",
            json!({
                "Cluster": r#ref(CLUSTER),
                "TaskDefinition": r#ref(TASK_DEFINITION),
                "DesiredCount": self.desired_count,
                "LaunchType": "FARGATE",
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "Subnets": subnet_refs,
                        "SecurityGroups": [r#ref(TASK_SG)],
                        "AssignPublicIp": "DISABLED",
                    },
                },
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContainerConfig, NetworkConfig};
    use crate::context::DeployContext;
    use std::collections::BTreeMap;

    #[test]
    fn task_logs_to_its_group_and_runs_privately() {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        let ctx = DeployContext::from_vars(vars).unwrap();

        let network = NetworkSpec::from_config(&ctx, &NetworkConfig::default());
        let spec = ContainerSpec::from_config(
            &ContainerConfig::default(),
            &network,
            "plinth-cluster".to_string(),
        );

        let mut t = Template::new("test");
        spec.synthesize(&mut t);

        let task = t.resource(TASK_DEFINITION).unwrap();
        let container = &task.properties["ContainerDefinitions"][0];
        assert_eq!(
            container["LogConfiguration"]["Options"]["awslogs-group"]["Ref"],
            LOG_GROUP
        );
        assert_eq!(task.properties["Cpu"], "256");
        assert_eq!(task.properties["Memory"], "512");

        let service = t.resource(SERVICE).unwrap();
        assert_eq!(service.properties["DesiredCount"], 2);
        let netcfg = &service.properties["NetworkConfiguration"]["AwsvpcConfiguration"];
        assert_eq!(netcfg["AssignPublicIp"], "DISABLED");
        assert_eq!(netcfg["Subnets"][0]["Ref"], "PrivateSubnet1");
    }
}
