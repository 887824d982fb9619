use serde_json::json;

use crate::config::DatabaseConfig;
use crate::template::{r#ref, sub, Template};

use super::network::NetworkSpec;
use super::security::DB_SG;

pub const DB_SECRET: &str = "DbCredentialsSecret";
pub const DB_SUBNET_GROUP: &str = "DbSubnetGroup";
pub const DB_INSTANCE: &str = "Database";

/// Relational database record: engine, size, credentials reference, and
/// network placement (private subnets behind the database boundary).
#[derive(Debug, Clone)]
pub struct DatabaseSpec {
    pub engine: String,
    pub instance_class: String,
    pub allocated_gb: u32,
    pub port: u16,
    pub db_name: String,
    pub multi_az: bool,
    pub subnet_ids: Vec<String>,
}

impl DatabaseSpec {
    pub fn from_config(cfg: &DatabaseConfig, network: &NetworkSpec) -> Self {
        Self {
            engine: cfg.engine.clone(),
            instance_class: cfg.instance_class.clone(),
            allocated_gb: cfg.allocated_gb,
            port: cfg.port,
            db_name: cfg.db_name.clone(),
            multi_az: cfg.multi_az,
            subnet_ids: network.private_subnet_ids(),
        }
    }

    pub fn synthesize(&self, t: &mut Template) {
        // Generated credentials; nothing secret ever lands in the template.
        t.add_resource(
            DB_SECRET,
            "AWS::SecretsManager::Secret",
            json!({
                "Description": "database credentials",
                "GenerateSecretString": {
                    "SecretStringTemplate": "{\"username\": \"appuser\"}",
                    "GenerateStringKey": "password",
                    "PasswordLength": 32,
                    "ExcludeCharacters": "\"@/\\",
                },
            }),
        );

        let subnet_refs: Vec<_> = self.subnet_ids.iter().map(|id| r#ref(id)).collect();
        t.add_resource(
            DB_SUBNET_GROUP,
            "AWS::RDS::DBSubnetGroup",
            json!({
                "DBSubnetGroupDescription": "private placement for the database",
                "SubnetIds": subnet_refs,
            }),
        );

        t.add_resource(
            DB_INSTANCE,
            "AWS::RDS::DBInstance",
            json!({
                "Engine": self.engine,
                "DBInstanceClass": self.instance_class,
                "AllocatedStorage": self.allocated_gb.to_string(),
                "DBName": self.db_name,
                "Port": self.port.to_string(),
                "MultiAZ": self.multi_az,
                "StorageEncrypted": true,
                "PubliclyAccessible": false,
                "DBSubnetGroupName": r#ref(DB_SUBNET_GROUP),
                "VPCSecurityGroups": [r#ref(DB_SG)],
                "MasterUsername": sub(&format!(
                    "{{{{resolve:secretsmanager:${{{DB_SECRET}}}:SecretString:username}}}}"
                )),
                "MasterUserPassword": sub(&format!(
                    "{{{{resolve:secretsmanager:${{{DB_SECRET}}}:SecretString:password}}}}"
                )),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, NetworkConfig};
    use crate::context::DeployContext;
    use std::collections::BTreeMap;

    fn network() -> NetworkSpec {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        let ctx = DeployContext::from_vars(vars).unwrap();
        NetworkSpec::from_config(&ctx, &NetworkConfig::default())
    }

    #[test]
    fn database_sits_in_private_subnets_behind_its_boundary() {
        let spec = DatabaseSpec::from_config(&DatabaseConfig::default(), &network());
        let mut t = Template::new("test");
        spec.synthesize(&mut t);

        let group = t.resource(DB_SUBNET_GROUP).unwrap();
        assert_eq!(group.properties["SubnetIds"][0]["Ref"], "PrivateSubnet1");

        let db = t.resource(DB_INSTANCE).unwrap();
        assert_eq!(db.properties["PubliclyAccessible"], false);
        assert_eq!(db.properties["VPCSecurityGroups"][0]["Ref"], DB_SG);
    }

    #[test]
    fn credentials_come_from_the_generated_secret() {
        let spec = DatabaseSpec::from_config(&DatabaseConfig::default(), &network());
        let mut t = Template::new("test");
        spec.synthesize(&mut t);

        let db = t.resource(DB_INSTANCE).unwrap();
        let user = db.properties["MasterUserPassword"]["Fn::Sub"]
            .as_str()
            .unwrap();
        assert!(user.contains("resolve:secretsmanager"));
        assert!(user.contains(DB_SECRET));
    }
}
