use anyhow::{bail, Result};
use serde_json::json;

use crate::config::NetworkConfig;
use crate::context::DeployContext;
use crate::template::{get_att, r#ref, Template};

pub const VPC: &str = "Vpc";
pub const INTERNET_GATEWAY: &str = "InternetGateway";
pub const GATEWAY_ATTACHMENT: &str = "VpcGatewayAttachment";
pub const PUBLIC_ROUTE_TABLE: &str = "PublicRouteTable";

pub fn public_subnet_id(index: usize) -> String {
    format!("PublicSubnet{}", index + 1)
}

pub fn private_subnet_id(index: usize) -> String {
    format!("PrivateSubnet{}", index + 1)
}

pub fn private_route_table_id(index: usize) -> String {
    format!("PrivateRouteTable{}", index + 1)
}

pub fn nat_gateway_id(index: usize) -> String {
    format!("NatGateway{}", index + 1)
}

fn nat_eip_id(index: usize) -> String {
    format!("NatEip{}", index + 1)
}

/// Network layout record: address space, one public and one private subnet
/// role per availability zone, internet gateway, NAT gateway count.
#[derive(Debug, Clone)]
pub struct NetworkSpec {
    pub cidr: String,
    pub azs: Vec<String>,
    pub nat_gateways: usize,
    pub name: String,
}

impl NetworkSpec {
    pub fn from_config(ctx: &DeployContext, cfg: &NetworkConfig) -> Self {
        Self {
            cidr: cfg.cidr.clone(),
            azs: ctx.availability_zones(cfg.az_count),
            // More NAT gateways than zones buys nothing.
            nat_gateways: cfg.nat_gateways.min(cfg.az_count),
            name: format!("{}-vpc", ctx.prefix()),
        }
    }

    pub fn public_subnet_ids(&self) -> Vec<String> {
        (0..self.azs.len()).map(public_subnet_id).collect()
    }

    pub fn private_subnet_ids(&self) -> Vec<String> {
        (0..self.azs.len()).map(private_subnet_id).collect()
    }

    pub fn synthesize(&self, t: &mut Template) -> Result<()> {
        t.add_resource(
            VPC,
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": self.cidr,
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
                "Tags": [{ "Key": "Name", "Value": self.name }],
            }),
        );

        t.add_resource(INTERNET_GATEWAY, "AWS::EC2::InternetGateway", json!({}));
        t.add_resource(
            GATEWAY_ATTACHMENT,
            "AWS::EC2::VPCGatewayAttachment",
            json!({
                "VpcId": r#ref(VPC),
                "InternetGatewayId": r#ref(INTERNET_GATEWAY),
            }),
        );

        t.add_resource(
            PUBLIC_ROUTE_TABLE,
            "AWS::EC2::RouteTable",
            json!({ "VpcId": r#ref(VPC) }),
        );
        t.add_resource_depending_on(
            "PublicDefaultRoute",
            "AWS::EC2::Route",
            json!({
                "RouteTableId": r#ref(PUBLIC_ROUTE_TABLE),
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": r#ref(INTERNET_GATEWAY),
            }),
            &[GATEWAY_ATTACHMENT],
        );

        for (i, az) in self.azs.iter().enumerate() {
            let public = public_subnet_id(i);
            t.add_resource(
                &public,
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": r#ref(VPC),
                    "AvailabilityZone": az,
                    "CidrBlock": subnet_cidr(&self.cidr, i as u8)?,
                    "MapPublicIpOnLaunch": true,
                    "Tags": [{ "Key": "Name", "Value": format!("{}-public-{}", self.name, i + 1) }],
                }),
            );
            t.add_resource(
                &format!("PublicSubnetRouteAssoc{}", i + 1),
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": r#ref(&public),
                    "RouteTableId": r#ref(PUBLIC_ROUTE_TABLE),
                }),
            );

            let private = private_subnet_id(i);
            t.add_resource(
                &private,
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": r#ref(VPC),
                    "AvailabilityZone": az,
                    "CidrBlock": subnet_cidr(&self.cidr, PRIVATE_OCTET_OFFSET + i as u8)?,
                    "MapPublicIpOnLaunch": false,
                    "Tags": [{ "Key": "Name", "Value": format!("{}-private-{}", self.name, i + 1) }],
                }),
            );
        }

        for n in 0..self.nat_gateways {
            t.add_resource(
                &nat_eip_id(n),
                "AWS::EC2::EIP",
                json!({ "Domain": "vpc" }),
            );
            t.add_resource_depending_on(
                &nat_gateway_id(n),
                "AWS::EC2::NatGateway",
                json!({
                    "SubnetId": r#ref(&public_subnet_id(n)),
                    "AllocationId": get_att(&nat_eip_id(n), "AllocationId"),
                }),
                &[GATEWAY_ATTACHMENT],
            );
        }

        for i in 0..self.azs.len() {
            let rt = private_route_table_id(i);
            t.add_resource(&rt, "AWS::EC2::RouteTable", json!({ "VpcId": r#ref(VPC) }));
            t.add_resource(
                &format!("PrivateSubnetRouteAssoc{}", i + 1),
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": r#ref(&private_subnet_id(i)),
                    "RouteTableId": r#ref(&rt),
                }),
            );

            // Zones without their own NAT gateway share round-robin.
            if self.nat_gateways > 0 {
                let nat = nat_gateway_id(i % self.nat_gateways);
                t.add_resource(
                    &format!("PrivateDefaultRoute{}", i + 1),
                    "AWS::EC2::Route",
                    json!({
                        "RouteTableId": r#ref(&rt),
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "NatGatewayId": r#ref(&nat),
                    }),
                );
            }
        }

        Ok(())
    }
}

const PRIVATE_OCTET_OFFSET: u8 = 100;

/// Carves a /24 out of the base block by setting the third octet. Only
/// masks of /24 or wider make sense here; validate checks the range before
/// synthesis runs.
fn subnet_cidr(base: &str, third_octet: u8) -> Result<String> {
    let Some((addr, _mask)) = base.split_once('/') else {
        bail!("network cidr is missing a mask: {base}");
    };

    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 {
        bail!("network cidr is not a dotted quad: {base}");
    }

    Ok(format!("{}.{}.{}.0/24", octets[0], octets[1], third_octet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use std::collections::BTreeMap;

    fn ctx() -> DeployContext {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        DeployContext::from_vars(vars).unwrap()
    }

    #[test]
    fn carves_public_and_private_blocks_apart() {
        assert_eq!(subnet_cidr("10.0.0.0/16", 0).unwrap(), "10.0.0.0/24");
        assert_eq!(subnet_cidr("10.0.0.0/16", 101).unwrap(), "10.0.101.0/24");
        assert_eq!(subnet_cidr("172.31.0.0/16", 1).unwrap(), "172.31.1.0/24");
    }

    #[test]
    fn one_subnet_per_role_per_zone() {
        let spec = NetworkSpec::from_config(&ctx(), &NetworkConfig::default());
        let mut t = Template::new("test");
        spec.synthesize(&mut t).unwrap();

        assert!(t.has_resource("PublicSubnet1"));
        assert!(t.has_resource("PublicSubnet2"));
        assert!(t.has_resource("PrivateSubnet1"));
        assert!(t.has_resource("PrivateSubnet2"));
        assert!(t.has_resource("NatGateway1"));
        assert!(!t.has_resource("NatGateway2"));
    }

    #[test]
    fn nat_gateways_never_exceed_zone_count() {
        let cfg = NetworkConfig {
            nat_gateways: 5,
            ..NetworkConfig::default()
        };
        let spec = NetworkSpec::from_config(&ctx(), &cfg);
        assert_eq!(spec.nat_gateways, 2);
    }
}
