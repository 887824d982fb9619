use anyhow::Result;

use crate::config::StackConfig;
use crate::context::DeployContext;
use crate::template::{get_att, r#ref, Template};
use crate::topology::{
    api::{HttpApiSpec, HTTP_API},
    compute::ComputeSpec,
    containers::ContainerSpec,
    database::{DatabaseSpec, DB_INSTANCE},
    iam,
    network::NetworkSpec,
    observability::ObservabilitySpec,
    routing::{RoutingSpec, LOAD_BALANCER},
    security,
    storage::{BucketSpec, BUCKET},
};
use crate::userdata;

/// The four labels every synthesized template must surface.
pub const OUTPUT_LB_ADDRESS: &str = "LoadBalancerAddress";
pub const OUTPUT_API_ADDRESS: &str = "ApiAddress";
pub const OUTPUT_BUCKET_NAME: &str = "AssetsBucketName";
pub const OUTPUT_DB_ADDRESS: &str = "DatabaseAddress";

/// Builds the whole descriptor tree and synthesizes it in one pass:
/// network first, then the boundaries and identities everything references,
/// then the storage/database/compute/routing core, the public surfaces,
/// and the observability layer last.
pub fn build(ctx: &DeployContext, cfg: &StackConfig) -> Result<Template> {
    let mut t = Template::new(cfg.plinth.description.clone());

    let network = NetworkSpec::from_config(ctx, &cfg.network);
    network.synthesize(&mut t)?;

    for group in security::security_groups(cfg) {
        group.synthesize(&mut t);
    }

    iam::synthesize_all(&mut t);

    let bucket = BucketSpec::from_config(ctx, &cfg.storage)?;
    bucket.synthesize(&mut t);

    let database = DatabaseSpec::from_config(&cfg.database, &network);
    database.synthesize(&mut t);

    let routing = RoutingSpec::from_config(
        &cfg.routing,
        &cfg.compute,
        &network,
        format!("{}-alb", ctx.prefix()),
    );
    routing.synthesize(&mut t);

    let user_data = userdata::render(ctx, cfg, &bucket)?;
    let compute = ComputeSpec::from_config(
        &cfg.compute,
        &network,
        format!("{}-app", ctx.prefix()),
        user_data,
    );
    compute.synthesize(&mut t);

    let api = HttpApiSpec::from_config(&cfg.api, format!("{}-api", ctx.prefix()));
    api.synthesize(&mut t);

    let containers = ContainerSpec::from_config(
        &cfg.containers,
        &network,
        format!("{}-cluster", ctx.prefix()),
    );
    containers.synthesize(&mut t);

    let observability = ObservabilitySpec::from_config(ctx, &cfg.observability)?;
    observability.synthesize(&mut t);

    t.add_output(
        OUTPUT_LB_ADDRESS,
        "Public address of the load balancer",
        get_att(LOAD_BALANCER, "DNSName"),
    );
    t.add_output(
        OUTPUT_API_ADDRESS,
        "Public address of the HTTP API",
        get_att(HTTP_API, "ApiEndpoint"),
    );
    t.add_output(
        OUTPUT_BUCKET_NAME,
        "Assets bucket identifier",
        r#ref(BUCKET),
    );
    t.add_output(
        OUTPUT_DB_ADDRESS,
        "Database endpoint address",
        get_att(DB_INSTANCE, "Endpoint.Address"),
    );

    Ok(t)
}
