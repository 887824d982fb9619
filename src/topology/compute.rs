use serde_json::json;

use crate::config::ComputeConfig;
use crate::template::{get_att, r#ref, Template};

use super::iam::INSTANCE_PROFILE;
use super::network::NetworkSpec;
use super::routing::TARGET_GROUP;
use super::security::APP_SG;

pub const LAUNCH_TEMPLATE: &str = "AppLaunchTemplate";
pub const AUTO_SCALING_GROUP: &str = "AppAutoScalingGroup";
pub const SCALE_OUT_POLICY: &str = "ScaleOutPolicy";
pub const SCALE_IN_POLICY: &str = "ScaleInPolicy";
pub const CPU_HIGH_ALARM: &str = "CpuHighAlarm";
pub const CPU_LOW_ALARM: &str = "CpuLowAlarm";

/// Latest Amazon Linux 2023 image, resolved by the control plane at deploy
/// time so the template never pins a per-region AMI id.
const AMI_SSM_PARAMETER: &str =
    "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64}}";

/// Compute-scaling record: launch template, scaling bounds, health-check
/// grace period, and the CPU step thresholds that drive the two policies.
#[derive(Debug, Clone)]
pub struct ComputeSpec {
    pub instance_type: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub desired_capacity: u32,
    pub health_grace_secs: u32,
    pub scale_out_cpu: f64,
    pub scale_in_cpu: f64,
    pub scaling_evaluation_periods: u32,
    pub user_data: String,
    pub subnet_ids: Vec<String>,
    pub name: String,
}

impl ComputeSpec {
    pub fn from_config(
        cfg: &ComputeConfig,
        network: &NetworkSpec,
        name: String,
        user_data: String,
    ) -> Self {
        Self {
            instance_type: cfg.instance_type.clone(),
            min_capacity: cfg.min_capacity,
            max_capacity: cfg.max_capacity,
            desired_capacity: cfg.desired_capacity,
            health_grace_secs: cfg.health_grace_secs,
            scale_out_cpu: cfg.scale_out_cpu,
            scale_in_cpu: cfg.scale_in_cpu,
            scaling_evaluation_periods: cfg.scaling_evaluation_periods,
            user_data,
            subnet_ids: network.private_subnet_ids(),
            name,
        }
    }

    pub fn synthesize(&self, t: &mut Template) {
        t.add_resource(
            LAUNCH_TEMPLATE,
            "AWS::EC2::LaunchTemplate",
            json!({
                "LaunchTemplateData": {
                    "InstanceType": self.instance_type,
                    "ImageId": AMI_SSM_PARAMETER,
                    "IamInstanceProfile": { "Arn": get_att(INSTANCE_PROFILE, "Arn") },
                    "SecurityGroupIds": [r#ref(APP_SG)],
                    "UserData": { "Fn::Base64": self.user_data },
                },
            }),
        );

        let subnet_refs: Vec<_> = self.subnet_ids.iter().map(|id| r#ref(id)).collect();
        t.add_resource(
            AUTO_SCALING_GROUP,
            "AWS::AutoScaling::AutoScalingGroup",
            json!({
                "MinSize": self.min_capacity.to_string(),
                "MaxSize": self.max_capacity.to_string(),
                "DesiredCapacity": self.desired_capacity.to_string(),
                "VPCZoneIdentifier": subnet_refs,
                "TargetGroupARNs": [r#ref(TARGET_GROUP)],
                "HealthCheckType": "ELB",
                "HealthCheckGracePeriod": self.health_grace_secs,
                "LaunchTemplate": {
                    "LaunchTemplateId": r#ref(LAUNCH_TEMPLATE),
                    "Version": get_att(LAUNCH_TEMPLATE, "LatestVersionNumber"),
                },
                "Tags": [{
                    "Key": "Name",
                    "Value": self.name,
                    "PropagateAtLaunch": true,
                }],
            }),
        );

        self.step_policy(t, SCALE_OUT_POLICY, 1);
        self.step_policy(t, SCALE_IN_POLICY, -1);

        self.cpu_alarm(
            t,
            CPU_HIGH_ALARM,
            self.scale_out_cpu,
            "GreaterThanOrEqualToThreshold",
            SCALE_OUT_POLICY,
        );
        self.cpu_alarm(
            t,
            CPU_LOW_ALARM,
            self.scale_in_cpu,
            "LessThanOrEqualToThreshold",
            SCALE_IN_POLICY,
        );
    }

    fn step_policy(&self, t: &mut Template, logical_id: &str, adjustment: i32) {
        // Interval bounds are relative to the alarm threshold.
        let step = if adjustment > 0 {
            json!({ "MetricIntervalLowerBound": 0, "ScalingAdjustment": adjustment })
        } else {
            json!({ "MetricIntervalUpperBound": 0, "ScalingAdjustment": adjustment })
        };

        t.add_resource(
            logical_id,
            "AWS::AutoScaling::ScalingPolicy",
            json!({
                "PolicyType": "StepScaling",
                "AdjustmentType": "ChangeInCapacity",
                "AutoScalingGroupName": r#ref(AUTO_SCALING_GROUP),
                "StepAdjustments": [step],
            }),
        );
    }

    fn cpu_alarm(
        &self,
        t: &mut Template,
        logical_id: &str,
        threshold: f64,
        comparison: &str,
        policy_id: &str,
    ) {
        t.add_resource(
            logical_id,
            "AWS::CloudWatch::Alarm",
            json!({
                "Namespace": "AWS/EC2",
                "MetricName": "CPUUtilization",
                "Statistic": "Average",
                "Period": 60,
                "EvaluationPeriods": self.scaling_evaluation_periods,
                "Threshold": threshold,
                "ComparisonOperator": comparison,
                "Dimensions": [{
                    "Name": "AutoScalingGroupName",
                    "Value": r#ref(AUTO_SCALING_GROUP),
                }],
                "AlarmActions": [r#ref(policy_id)],
            }),
        );
    }
}
