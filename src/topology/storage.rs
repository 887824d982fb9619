use anyhow::Result;
use serde_json::json;

use crate::config::StorageConfig;
use crate::context::DeployContext;
use crate::resolve::Resolver;
use crate::template::Template;

pub const BUCKET: &str = "AssetsBucket";

/// Object store record: versioning, encryption, public-access blocking.
#[derive(Debug, Clone)]
pub struct BucketSpec {
    pub bucket_name: String,
    pub versioned: bool,
    pub encrypt: bool,
    pub block_public_access: bool,
}

impl BucketSpec {
    pub fn from_config(ctx: &DeployContext, cfg: &StorageConfig) -> Result<Self> {
        let r = Resolver::new(ctx);
        Ok(Self {
            // Bucket names are global; account + region keep them unique.
            bucket_name: r.resolve(&cfg.bucket_name)?,
            versioned: cfg.versioned,
            encrypt: cfg.encrypt,
            block_public_access: cfg.block_public_access,
        })
    }

    pub fn synthesize(&self, t: &mut Template) {
        let mut props = json!({ "BucketName": self.bucket_name });

        if self.versioned {
            props["VersioningConfiguration"] = json!({ "Status": "Enabled" });
        }

        if self.encrypt {
            props["BucketEncryption"] = json!({
                "ServerSideEncryptionConfiguration": [{
                    "ServerSideEncryptionByDefault": { "SSEAlgorithm": "aws:kms" },
                }],
            });
        }

        if self.block_public_access {
            props["PublicAccessBlockConfiguration"] = json!({
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            });
        }

        t.add_resource(BUCKET, "AWS::S3::Bucket", props);
    }
}
