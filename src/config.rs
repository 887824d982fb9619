use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// Sizing and naming overrides for the synthesized topology. Every knob has
/// a built-in default, so the tool works with no config file at all; a
/// `stack.toml` only needs the fields it wants to change.
#[derive(Debug, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub plinth: PlinthMeta,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub compute: ComputeConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub containers: ContainerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl StackConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let cfg: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn builtin() -> Self {
        Self {
            plinth: PlinthMeta::default(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            compute: ComputeConfig::default(),
            routing: RoutingConfig::default(),
            api: ApiConfig::default(),
            containers: ContainerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlinthMeta {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default = "default_stack_description")]
    pub description: String,
}

impl Default for PlinthMeta {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            description: default_stack_description(),
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

fn default_stack_description() -> String {
    "plinth deployment topology".to_string()
}

// -------------------- network --------------------

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    /// Base address block. Subnets are carved out of it one /24 at a time,
    /// so the mask must leave room (see validate).
    #[serde(default = "default_cidr")]
    pub cidr: String,

    #[serde(default = "default_az_count")]
    pub az_count: usize,

    #[serde(default = "default_nat_gateways")]
    pub nat_gateways: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            az_count: default_az_count(),
            nat_gateways: default_nat_gateways(),
        }
    }
}

fn default_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_az_count() -> usize {
    2
}

fn default_nat_gateways() -> usize {
    1
}

// -------------------- storage --------------------

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub versioned: bool,

    #[serde(default = "default_true")]
    pub encrypt: bool,

    #[serde(default = "default_true")]
    pub block_public_access: bool,

    /// Name supports {prefix}/{region}/{account} tokens.
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            versioned: true,
            encrypt: true,
            block_public_access: true,
            bucket_name: default_bucket_name(),
        }
    }
}

fn default_bucket_name() -> String {
    "{prefix}-{account}-{region}-assets".to_string()
}

// -------------------- database --------------------

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_engine")]
    pub engine: String,

    #[serde(default = "default_db_instance_class")]
    pub instance_class: String,

    #[serde(default = "default_db_allocated_gb")]
    pub allocated_gb: u32,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default)]
    pub multi_az: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: default_db_engine(),
            instance_class: default_db_instance_class(),
            allocated_gb: default_db_allocated_gb(),
            port: default_db_port(),
            db_name: default_db_name(),
            multi_az: false,
        }
    }
}

fn default_db_engine() -> String {
    "postgres".to_string()
}

fn default_db_instance_class() -> String {
    "db.t3.micro".to_string()
}

fn default_db_allocated_gb() -> u32 {
    20
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "appdb".to_string()
}

// -------------------- compute --------------------

#[derive(Debug, Deserialize)]
pub struct ComputeConfig {
    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_min_capacity")]
    pub min_capacity: u32,

    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,

    #[serde(default = "default_desired_capacity")]
    pub desired_capacity: u32,

    /// Port the backend process listens on; the target group and the
    /// instance security group both key off it.
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    #[serde(default = "default_health_grace_secs")]
    pub health_grace_secs: u32,

    /// CPU utilization thresholds driving the step-scaling policies.
    #[serde(default = "default_scale_out_cpu")]
    pub scale_out_cpu: f64,

    #[serde(default = "default_scale_in_cpu")]
    pub scale_in_cpu: f64,

    #[serde(default = "default_scaling_evaluation_periods")]
    pub scaling_evaluation_periods: u32,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            instance_type: default_instance_type(),
            min_capacity: default_min_capacity(),
            max_capacity: default_max_capacity(),
            desired_capacity: default_desired_capacity(),
            app_port: default_app_port(),
            health_grace_secs: default_health_grace_secs(),
            scale_out_cpu: default_scale_out_cpu(),
            scale_in_cpu: default_scale_in_cpu(),
            scaling_evaluation_periods: default_scaling_evaluation_periods(),
        }
    }
}

fn default_instance_type() -> String {
    "t3.micro".to_string()
}

fn default_min_capacity() -> u32 {
    1
}

fn default_max_capacity() -> u32 {
    4
}

fn default_desired_capacity() -> u32 {
    2
}

fn default_app_port() -> u16 {
    8080
}

fn default_health_grace_secs() -> u32 {
    120
}

fn default_scale_out_cpu() -> f64 {
    70.0
}

fn default_scale_in_cpu() -> f64 {
    25.0
}

fn default_scaling_evaluation_periods() -> u32 {
    3
}

// -------------------- routing --------------------

#[derive(Debug, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,

    #[serde(default = "default_listener_protocol")]
    pub protocol: String,

    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    #[serde(default = "default_healthy_status")]
    pub healthy_status: u16,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            listener_port: default_listener_port(),
            protocol: default_listener_protocol(),
            health_check_path: default_health_check_path(),
            healthy_status: default_healthy_status(),
        }
    }
}

fn default_listener_port() -> u16 {
    80
}

fn default_listener_protocol() -> String {
    "HTTP".to_string()
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_healthy_status() -> u16 {
    200
}

// -------------------- public api --------------------

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_cors_methods")]
    pub cors_methods: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            route_prefix: default_route_prefix(),
            cors_origins: default_cors_origins(),
            cors_methods: default_cors_methods(),
        }
    }
}

fn default_route_prefix() -> String {
    "/api".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()]
}

// -------------------- containers --------------------

#[derive(Debug, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_container_image")]
    pub image: String,

    /// Task-level limits in Fargate units (cpu) and MiB (memory).
    #[serde(default = "default_task_cpu")]
    pub cpu: u32,

    #[serde(default = "default_task_memory_mib")]
    pub memory_mib: u32,

    #[serde(default = "default_desired_replicas")]
    pub desired_count: u32,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: default_container_image(),
            cpu: default_task_cpu(),
            memory_mib: default_task_memory_mib(),
            desired_count: default_desired_replicas(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

fn default_container_image() -> String {
    "public.ecr.aws/amazonlinux/amazonlinux:2023".to_string()
}

fn default_task_cpu() -> u32 {
    256
}

fn default_task_memory_mib() -> u32 {
    512
}

fn default_desired_replicas() -> u32 {
    2
}

fn default_log_retention_days() -> u32 {
    30
}

// -------------------- observability --------------------

#[derive(Debug, Deserialize)]
pub struct ObservabilityConfig {
    /// Supports {prefix}/{region} tokens.
    #[serde(default = "default_dashboard_name")]
    pub dashboard_name: String,

    #[serde(default = "default_alarms")]
    pub alarms: Vec<AlarmConfig>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            dashboard_name: default_dashboard_name(),
            alarms: default_alarms(),
        }
    }
}

/// One alarm triple: metric, threshold, evaluation window.
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmConfig {
    pub name: String,
    pub namespace: String,
    pub metric: String,
    pub threshold: f64,

    #[serde(default = "default_alarm_evaluation_periods")]
    pub evaluation_periods: u32,

    #[serde(default = "default_alarm_period_secs")]
    pub period_secs: u32,

    #[serde(default = "default_comparison")]
    pub comparison: Comparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Comparison {
    pub fn as_operator(self) -> &'static str {
        match self {
            Comparison::GreaterThanOrEqual => "GreaterThanOrEqualToThreshold",
            Comparison::LessThanOrEqual => "LessThanOrEqualToThreshold",
        }
    }
}

fn default_comparison() -> Comparison {
    Comparison::GreaterThanOrEqual
}

fn default_dashboard_name() -> String {
    "{prefix}-overview".to_string()
}

fn default_alarm_evaluation_periods() -> u32 {
    3
}

fn default_alarm_period_secs() -> u32 {
    60
}

fn default_alarms() -> Vec<AlarmConfig> {
    vec![
        AlarmConfig {
            name: "{prefix}-alb-5xx".to_string(),
            namespace: "AWS/ApplicationELB".to_string(),
            metric: "HTTPCode_ELB_5XX_Count".to_string(),
            threshold: 5.0,
            evaluation_periods: 3,
            period_secs: 60,
            comparison: Comparison::GreaterThanOrEqual,
        },
        AlarmConfig {
            name: "{prefix}-db-cpu".to_string(),
            namespace: "AWS/RDS".to_string(),
            metric: "CPUUtilization".to_string(),
            threshold: 80.0,
            evaluation_periods: 5,
            period_secs: 60,
            comparison: Comparison::GreaterThanOrEqual,
        },
        AlarmConfig {
            name: "{prefix}-asg-unhealthy".to_string(),
            namespace: "AWS/AutoScaling".to_string(),
            metric: "GroupInServiceInstances".to_string(),
            threshold: 1.0,
            evaluation_periods: 3,
            period_secs: 60,
            comparison: Comparison::LessThanOrEqual,
        },
    ]
}

fn default_true() -> bool {
    true
}

// -------------------- stub for --init --------------------

pub fn write_config_stub(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let stub = r#"# plinth stack.toml (created by plinth --init)
#
# Every field is optional; anything left out keeps its built-in default.
# Names may use {prefix}, {account}, {region}, {host} and {env.VAR} tokens.

[plinth]
schema_version = 1
description    = "plinth deployment topology"

[network]
cidr         = "10.0.0.0/16"
az_count     = 2
nat_gateways = 1

[compute]
instance_type    = "t3.micro"
min_capacity     = 1
max_capacity     = 4
desired_capacity = 2
app_port         = 8080

[routing]
listener_port     = 80
health_check_path = "/health"

[database]
engine         = "postgres"
instance_class = "db.t3.micro"

[containers]
image         = "public.ecr.aws/amazonlinux/amazonlinux:2023"
desired_count = 2
"#;
    fs::write(path, stub).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn empty_config_uses_builtin_defaults() {
        let cfg: StackConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.network.cidr, "10.0.0.0/16");
        assert_eq!(cfg.compute.desired_capacity, 2);
        assert_eq!(cfg.routing.health_check_path, "/health");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.observability.alarms.len(), 3);
    }

    #[test]
    fn partial_override_keeps_the_rest() {
        let cfg: StackConfig = toml::from_str(
            r#"
            [compute]
            max_capacity = 10
            app_port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.compute.max_capacity, 10);
        assert_eq!(cfg.compute.app_port, 9000);
        assert_eq!(cfg.compute.min_capacity, 1);
        assert_eq!(cfg.network.az_count, 2);
    }

    #[test]
    fn alarm_override_replaces_default_set() {
        let cfg: StackConfig = toml::from_str(
            r#"
            [[observability.alarms]]
            name = "custom"
            namespace = "AWS/RDS"
            metric = "FreeStorageSpace"
            threshold = 1000000.0
            comparison = "less_than_or_equal"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.observability.alarms.len(), 1);
        assert_eq!(cfg.observability.alarms[0].metric, "FreeStorageSpace");
        assert_eq!(
            cfg.observability.alarms[0].comparison,
            Comparison::LessThanOrEqual
        );
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[network]\naz_count = 3").unwrap();

        let cfg = StackConfig::load_from_path(f.path()).unwrap();
        assert_eq!(cfg.network.az_count, 3);
    }

    #[test]
    fn stub_creates_directories_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("plinth").join("stack.toml");

        write_config_stub(&path).unwrap();
        assert!(path.exists());

        let cfg = StackConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.network.cidr, "10.0.0.0/16");
        assert_eq!(cfg.compute.max_capacity, 4);
    }
}
