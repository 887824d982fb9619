use std::collections::BTreeMap;
use std::io::Write as _;

use plinth::{config::StackConfig, context::DeployContext, stack, validate};
use serde_json::Value;

fn ctx() -> DeployContext {
    let mut vars = BTreeMap::new();
    vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
    vars.insert("PLINTH_REGION".to_string(), "eu-west-1".to_string());
    vars.insert("PLINTH_PREFIX".to_string(), "acme".to_string());
    DeployContext::from_vars(vars).unwrap()
}

#[test]
fn default_topology_synthesizes_without_findings() {
    let cfg = StackConfig::builtin();
    let t = stack::build(&ctx(), &cfg).unwrap();

    assert!(validate::check(&cfg, &t).is_ok());
    // Every family lands in the template.
    assert!(t.count_by_service("AWS::EC2") > 0);
    assert!(t.count_by_service("AWS::S3") > 0);
    assert!(t.count_by_service("AWS::RDS") > 0);
    assert!(t.count_by_service("AWS::AutoScaling") > 0);
    assert!(t.count_by_service("AWS::ElasticLoadBalancingV2") > 0);
    assert!(t.count_by_service("AWS::ApiGatewayV2") > 0);
    assert!(t.count_by_service("AWS::ECS") > 0);
    assert!(t.count_by_service("AWS::IAM") > 0);
    assert!(t.count_by_service("AWS::CloudWatch") > 0);
}

#[test]
fn template_round_trips_as_json_with_labeled_outputs() {
    let cfg = StackConfig::builtin();
    let t = stack::build(&ctx(), &cfg).unwrap();

    let v: Value = serde_json::from_str(&t.to_json_pretty().unwrap()).unwrap();
    assert_eq!(v["AWSTemplateFormatVersion"], "2010-09-09");

    let outputs = v["Outputs"].as_object().unwrap();
    for label in [
        "LoadBalancerAddress",
        "ApiAddress",
        "AssetsBucketName",
        "DatabaseAddress",
    ] {
        assert!(outputs.contains_key(label), "missing output {label}");
        assert!(outputs[label]["Description"].is_string());
    }

    assert_eq!(
        v["Outputs"]["LoadBalancerAddress"]["Value"]["Fn::GetAtt"][0],
        "LoadBalancer"
    );
}

#[test]
fn prefix_flows_into_resource_names() {
    let cfg = StackConfig::builtin();
    let t = stack::build(&ctx(), &cfg).unwrap();

    let alb = t.resource("LoadBalancer").unwrap();
    assert_eq!(alb.properties["Name"], "acme-alb");

    let cluster = t.resource("Cluster").unwrap();
    assert_eq!(cluster.properties["ClusterName"], "acme-cluster");

    let bucket = t.resource("AssetsBucket").unwrap();
    assert_eq!(
        bucket.properties["BucketName"],
        "acme-111122223333-eu-west-1-assets"
    );
}

#[test]
fn config_overrides_reach_the_synthesized_resources() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(
        f,
        r#"
        [network]
        az_count = 3
        nat_gateways = 3

        [compute]
        app_port = 9090
        max_capacity = 8

        [routing]
        health_check_path = "/status"
        "#
    )
    .unwrap();

    let cfg = StackConfig::load_from_path(f.path()).unwrap();
    let t = stack::build(&ctx(), &cfg).unwrap();
    assert!(validate::check(&cfg, &t).is_ok());

    assert!(t.has_resource("PublicSubnet3"));
    assert!(t.has_resource("NatGateway3"));

    let tg = t.resource("AppTargetGroup").unwrap();
    assert_eq!(tg.properties["Port"], 9090);
    assert_eq!(tg.properties["HealthCheckPath"], "/status");

    let asg = t.resource("AppAutoScalingGroup").unwrap();
    assert_eq!(asg.properties["MaxSize"], "8");

    // Boundary rules follow the overridden port, so validation stays clean.
    let app_sg = t.resource("AppSecurityGroup").unwrap();
    assert_eq!(app_sg.properties["SecurityGroupIngress"][0]["FromPort"], 9090);
}

#[test]
fn inverted_scaling_bounds_fail_validation() {
    let cfg = StackConfig::builtin();
    let t = stack::build(&ctx(), &cfg).unwrap();

    let mut skewed = StackConfig::builtin();
    skewed.compute.min_capacity = 9;
    let err = validate::check(&skewed, &t).unwrap_err();
    assert!(err.to_string().contains("min <= desired <= max"));
}

#[test]
fn zero_nat_gateways_still_synthesizes() {
    let mut cfg = StackConfig::builtin();
    cfg.network.nat_gateways = 0;

    let t = stack::build(&ctx(), &cfg).unwrap();
    assert!(validate::check(&cfg, &t).is_ok());
    assert!(!t.has_resource("NatGateway1"));
    // Private route tables still exist, just without a default route.
    assert!(t.has_resource("PrivateRouteTable1"));
    assert!(!t.has_resource("PrivateDefaultRoute1"));
}
