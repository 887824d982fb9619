use anyhow::{Context as _, Result};
use minijinja::Environment;
use serde_json::json;

use crate::config::StackConfig;
use crate::context::DeployContext;
use crate::topology::storage::BucketSpec;

const USERDATA_TEMPLATE: &str = include_str!("../assets/userdata.sh.j2");

/// Renders the instance bootstrap script. The rendered text goes into the
/// launch template verbatim; the control plane base64-encodes it.
pub fn render(ctx: &DeployContext, cfg: &StackConfig, bucket: &BucketSpec) -> Result<String> {
    let ctx_json = json!({
        "region": ctx.region(),
        "bucket": bucket.bucket_name,
        "app_port": cfg.compute.app_port,
        "health_path": cfg.routing.health_check_path,
        "healthy_status": cfg.routing.healthy_status,
    });

    render_minijinja(USERDATA_TEMPLATE, &ctx_json).context("user-data render failed")
}

fn render_minijinja(source: &str, ctx_json: &serde_json::Value) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("userdata", source)?;
    let tpl = env.get_template("userdata")?;
    let v = minijinja::value::Value::from_serialize(ctx_json);
    Ok(tpl.render(v)?)
}
