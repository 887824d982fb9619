use serde_json::{json, Value};

use crate::template::{get_att, r#ref, sub, Template};

use super::database::DB_SECRET;
use super::storage::BUCKET;

pub const APP_ROLE: &str = "AppInstanceRole";
pub const INSTANCE_PROFILE: &str = "AppInstanceProfile";
pub const TASK_ROLE: &str = "AgentTaskRole";
pub const TASK_EXECUTION_ROLE: &str = "AgentExecutionRole";

/// Identity record: who may assume the role, which managed policies attach,
/// and which resources its inline grants cover.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub logical_id: &'static str,
    pub service_principal: &'static str,
    pub managed_policy_names: Vec<&'static str>,
    pub grants: Vec<Grant>,
}

#[derive(Debug, Clone)]
pub enum Grant {
    BucketReadWrite,
    SecretRead,
}

impl Grant {
    fn statement(&self) -> Value {
        match self {
            Grant::BucketReadWrite => json!({
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
                "Resource": [
                    get_att(BUCKET, "Arn"),
                    sub(&format!("${{{BUCKET}.Arn}}/*")),
                ],
            }),
            Grant::SecretRead => json!({
                "Effect": "Allow",
                "Action": ["secretsmanager:GetSecretValue"],
                "Resource": r#ref(DB_SECRET),
            }),
        }
    }
}

impl RoleSpec {
    pub fn synthesize(&self, t: &mut Template) {
        let managed: Vec<Value> = self
            .managed_policy_names
            .iter()
            .map(|name| sub(&format!("arn:${{AWS::Partition}}:iam::aws:policy/{name}")))
            .collect();

        let mut props = json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": self.service_principal },
                    "Action": "sts:AssumeRole",
                }],
            },
            "ManagedPolicyArns": managed,
        });

        if !self.grants.is_empty() {
            let statements: Vec<Value> = self.grants.iter().map(Grant::statement).collect();
            props["Policies"] = json!([{
                "PolicyName": "resource-grants",
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": statements,
                },
            }]);
        }

        t.add_resource(self.logical_id, "AWS::IAM::Role", props);
    }
}

/// The three identities the topology needs, plus the instance profile that
/// hands the instance role to the launch template.
pub fn roles() -> Vec<RoleSpec> {
    vec![
        RoleSpec {
            logical_id: APP_ROLE,
            service_principal: "ec2.amazonaws.com",
            managed_policy_names: vec!["AmazonSSMManagedInstanceCore"],
            grants: vec![Grant::BucketReadWrite, Grant::SecretRead],
        },
        RoleSpec {
            logical_id: TASK_ROLE,
            service_principal: "ecs-tasks.amazonaws.com",
            managed_policy_names: vec![],
            grants: vec![Grant::BucketReadWrite],
        },
        RoleSpec {
            logical_id: TASK_EXECUTION_ROLE,
            service_principal: "ecs-tasks.amazonaws.com",
            managed_policy_names: vec!["service-role/AmazonECSTaskExecutionRolePolicy"],
            grants: vec![],
        },
    ]
}

pub fn synthesize_all(t: &mut Template) {
    for role in roles() {
        role.synthesize(t);
    }

    t.add_resource(
        INSTANCE_PROFILE,
        "AWS::IAM::InstanceProfile",
        json!({ "Roles": [r#ref(APP_ROLE)] }),
    );
}
