use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// The synthesized deployment template: a resources map plus an outputs map,
/// serialized as CloudFormation-shaped JSON. Record families append into it
/// through [`Template::add_resource`]; cross-references use the intrinsic
/// helpers ([`r#ref`], [`get_att`], [`sub`]).
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,

    description: String,

    resources: BTreeMap<String, Resource>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,

    // Logical ids inserted more than once. The later insert wins in the
    // resources map; validation turns these into findings.
    #[serde(skip)]
    duplicate_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,

    #[serde(rename = "Properties")]
    pub properties: Value,

    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub description: String,
    pub value: Value,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: "2010-09-09",
            description: description.into(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            duplicate_ids: Vec::new(),
        }
    }

    pub fn add_resource(&mut self, logical_id: &str, kind: &str, properties: Value) {
        self.insert_resource(
            logical_id,
            Resource {
                kind: kind.to_string(),
                properties,
                depends_on: Vec::new(),
            },
        );
    }

    pub fn add_resource_depending_on(
        &mut self,
        logical_id: &str,
        kind: &str,
        properties: Value,
        depends_on: &[&str],
    ) {
        self.insert_resource(
            logical_id,
            Resource {
                kind: kind.to_string(),
                properties,
                depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    fn insert_resource(&mut self, logical_id: &str, resource: Resource) {
        if self
            .resources
            .insert(logical_id.to_string(), resource)
            .is_some()
        {
            self.duplicate_ids.push(logical_id.to_string());
        }
    }

    pub fn add_output(&mut self, label: &str, description: &str, value: Value) {
        self.outputs.insert(
            label.to_string(),
            Output {
                description: description.to_string(),
                value,
            },
        );
    }

    pub fn has_resource(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Logical ids that were written more than once, in insertion order.
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicate_ids
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Count of resources whose type lives under the given service prefix,
    /// e.g. `"AWS::EC2"`.
    pub fn count_by_service(&self, prefix: &str) -> usize {
        self.resources
            .values()
            .filter(|r| r.kind.starts_with(prefix))
            .count()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json_compact(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// -------------------- intrinsic helpers --------------------

pub fn r#ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attr: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attr] })
}

/// `Fn::Sub` expression; `${Name}` placeholders refer to logical ids or
/// pseudo-parameters.
pub fn sub(expr: &str) -> Value {
    json!({ "Fn::Sub": expr })
}

/// Pseudo-parameters that are always resolvable without a matching resource.
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::Region",
    "AWS::StackName",
    "AWS::Partition",
    "AWS::URLSuffix",
    "AWS::NoValue",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_resource_and_output_sections() {
        let mut t = Template::new("test stack");
        t.add_resource("Vpc", "AWS::EC2::VPC", json!({ "CidrBlock": "10.0.0.0/16" }));
        t.add_output("VpcId", "the vpc", r#ref("Vpc"));

        let text = t.to_json_pretty().unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(v["Resources"]["Vpc"]["Type"], "AWS::EC2::VPC");
        assert_eq!(v["Resources"]["Vpc"]["Properties"]["CidrBlock"], "10.0.0.0/16");
        assert_eq!(v["Outputs"]["VpcId"]["Value"]["Ref"], "Vpc");
    }

    #[test]
    fn depends_on_omitted_when_empty() {
        let mut t = Template::new("test");
        t.add_resource("A", "AWS::EC2::VPC", json!({}));
        t.add_resource_depending_on("B", "AWS::EC2::Subnet", json!({}), &["A"]);

        let v: Value = serde_json::from_str(&t.to_json_compact().unwrap()).unwrap();
        assert!(v["Resources"]["A"].get("DependsOn").is_none());
        assert_eq!(v["Resources"]["B"]["DependsOn"][0], "A");
    }

    #[test]
    fn reinserted_logical_id_is_recorded() {
        let mut t = Template::new("test");
        t.add_resource("Vpc", "AWS::EC2::VPC", json!({}));
        assert!(t.duplicate_ids().is_empty());

        t.add_resource("Vpc", "AWS::EC2::VPC", json!({ "CidrBlock": "10.1.0.0/16" }));
        assert_eq!(t.duplicate_ids(), ["Vpc"]);
        assert_eq!(t.resource_count(), 1);
    }

    #[test]
    fn counts_by_service_prefix() {
        let mut t = Template::new("test");
        t.add_resource("Vpc", "AWS::EC2::VPC", json!({}));
        t.add_resource("Sg", "AWS::EC2::SecurityGroup", json!({}));
        t.add_resource("Bucket", "AWS::S3::Bucket", json!({}));

        assert_eq!(t.count_by_service("AWS::EC2"), 2);
        assert_eq!(t.count_by_service("AWS::S3"), 1);
    }
}
