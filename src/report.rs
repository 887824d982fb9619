use crate::{cli, config::StackConfig, template::Template};

pub fn build_report(cfg: &StackConfig, t: &Template, mode: cli::ReportMode) -> String {
    match mode {
        cli::ReportMode::Off => String::new(),
        cli::ReportMode::Summary => summary(cfg, t),
        cli::ReportMode::Full => format!("{cfg:#?}"),
    }
}

fn summary(cfg: &StackConfig, t: &Template) -> String {
    let mut out = String::new();

    out.push_str("plinth report (summary)\n");
    out.push_str("=======================\n");
    out.push_str(&format!("schema_version: {}\n", cfg.plinth.schema_version));
    out.push_str(&format!("resources: {}\n", t.resource_count()));
    out.push_str(&format!("outputs: {}\n", t.outputs().len()));

    out.push_str("\nby service\n");
    for (label, prefix) in [
        ("network", "AWS::EC2"),
        ("scaling", "AWS::AutoScaling"),
        ("routing", "AWS::ElasticLoadBalancingV2"),
        ("storage", "AWS::S3"),
        ("database", "AWS::RDS"),
        ("containers", "AWS::ECS"),
        ("api", "AWS::ApiGatewayV2"),
        ("identity", "AWS::IAM"),
        ("monitoring", "AWS::CloudWatch"),
    ] {
        out.push_str(&format!("  {}: {}\n", label, t.count_by_service(prefix)));
    }

    out.push_str("\nsizing\n");
    out.push_str(&format!(
        "  network: {} over {} zones, {} nat\n",
        cfg.network.cidr, cfg.network.az_count, cfg.network.nat_gateways
    ));
    out.push_str(&format!(
        "  compute: {} x {}..{} (desired {}), app port {}\n",
        cfg.compute.instance_type,
        cfg.compute.min_capacity,
        cfg.compute.max_capacity,
        cfg.compute.desired_capacity,
        cfg.compute.app_port
    ));
    out.push_str(&format!(
        "  routing: listener {} -> {} ({} expecting {})\n",
        cfg.routing.listener_port,
        cfg.compute.app_port,
        cfg.routing.health_check_path,
        cfg.routing.healthy_status
    ));
    out.push_str(&format!(
        "  database: {} {} port {}\n",
        cfg.database.engine, cfg.database.instance_class, cfg.database.port
    ));
    out.push_str(&format!(
        "  containers: {} replicas of {}\n",
        cfg.containers.desired_count, cfg.containers.image
    ));
    out.push_str(&format!(
        "  alarms: {}\n",
        cfg.observability.alarms.len()
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeployContext;
    use crate::stack;
    use std::collections::BTreeMap;

    #[test]
    fn summary_names_every_family() {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        let ctx = DeployContext::from_vars(vars).unwrap();

        let cfg = StackConfig::builtin();
        let t = stack::build(&ctx, &cfg).unwrap();
        let text = build_report(&cfg, &t, cli::ReportMode::Summary);

        for family in ["network", "routing", "database", "containers", "monitoring"] {
            assert!(text.contains(family), "report lacks {family}");
        }
    }
}
