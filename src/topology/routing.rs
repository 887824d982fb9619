use serde_json::json;

use crate::config::{ComputeConfig, RoutingConfig};
use crate::template::{r#ref, Template};

use super::network::{NetworkSpec, VPC};
use super::security::ALB_SG;

pub const LOAD_BALANCER: &str = "LoadBalancer";
pub const TARGET_GROUP: &str = "AppTargetGroup";
pub const LISTENER: &str = "HttpListener";

/// Routing record: listener port/protocol on the public load balancer,
/// target group health-check path and expected status.
#[derive(Debug, Clone)]
pub struct RoutingSpec {
    pub listener_port: u16,
    pub protocol: String,
    pub target_port: u16,
    pub health_check_path: String,
    pub healthy_status: u16,
    pub subnet_ids: Vec<String>,
    pub name: String,
}

impl RoutingSpec {
    pub fn from_config(
        cfg: &RoutingConfig,
        compute: &ComputeConfig,
        network: &NetworkSpec,
        name: String,
    ) -> Self {
        Self {
            listener_port: cfg.listener_port,
            protocol: cfg.protocol.clone(),
            target_port: compute.app_port,
            health_check_path: cfg.health_check_path.clone(),
            healthy_status: cfg.healthy_status,
            subnet_ids: network.public_subnet_ids(),
            name,
        }
    }

    pub fn synthesize(&self, t: &mut Template) {
        let subnet_refs: Vec<_> = self.subnet_ids.iter().map(|id| r#ref(id)).collect();
        t.add_resource(
            LOAD_BALANCER,
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            json!({
                "Name": self.name,
                "Type": "application",
                "Scheme": "internet-facing",
                "Subnets": subnet_refs,
                "SecurityGroups": [r#ref(ALB_SG)],
            }),
        );

        t.add_resource(
            TARGET_GROUP,
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            json!({
                "VpcId": r#ref(VPC),
                "Port": self.target_port,
                "Protocol": "HTTP",
                "TargetType": "instance",
                "HealthCheckPath": self.health_check_path,
                "HealthCheckIntervalSeconds": 30,
                "HealthyThresholdCount": 2,
                "UnhealthyThresholdCount": 3,
                "Matcher": { "HttpCode": self.healthy_status.to_string() },
            }),
        );

        t.add_resource(
            LISTENER,
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "LoadBalancerArn": r#ref(LOAD_BALANCER),
                "Port": self.listener_port,
                "Protocol": self.protocol,
                "DefaultActions": [{
                    "Type": "forward",
                    "TargetGroupArn": r#ref(TARGET_GROUP),
                }],
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::context::DeployContext;
    use std::collections::BTreeMap;

    #[test]
    fn listener_forwards_to_the_health_checked_target_group() {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        let ctx = DeployContext::from_vars(vars).unwrap();

        let cfg = StackConfig::builtin();
        let network = NetworkSpec::from_config(&ctx, &cfg.network);
        let spec = RoutingSpec::from_config(
            &cfg.routing,
            &cfg.compute,
            &network,
            "plinth-alb".to_string(),
        );

        let mut t = Template::new("test");
        spec.synthesize(&mut t);

        let listener = t.resource(LISTENER).unwrap();
        assert_eq!(listener.properties["Port"], 80);
        assert_eq!(
            listener.properties["DefaultActions"][0]["TargetGroupArn"]["Ref"],
            TARGET_GROUP
        );

        let tg = t.resource(TARGET_GROUP).unwrap();
        assert_eq!(tg.properties["Port"], 8080);
        assert_eq!(tg.properties["HealthCheckPath"], "/health");
        assert_eq!(tg.properties["Matcher"]["HttpCode"], "200");

        let alb = t.resource(LOAD_BALANCER).unwrap();
        assert_eq!(alb.properties["Subnets"][0]["Ref"], "PublicSubnet1");
    }
}
