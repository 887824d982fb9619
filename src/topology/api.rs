use serde_json::json;

use crate::config::ApiConfig;
use crate::template::{r#ref, sub, Template};

use super::routing::LOAD_BALANCER;

pub const HTTP_API: &str = "HttpApi";
pub const API_INTEGRATION: &str = "ApiProxyIntegration";
pub const API_ROUTE: &str = "ApiProxyRoute";
pub const API_STAGE: &str = "ApiDefaultStage";

/// Public API record: routing prefix, proxy target (the load balancer),
/// CORS policy.
#[derive(Debug, Clone)]
pub struct HttpApiSpec {
    pub route_prefix: String,
    pub cors_origins: Vec<String>,
    pub cors_methods: Vec<String>,
    pub name: String,
}

impl HttpApiSpec {
    pub fn from_config(cfg: &ApiConfig, name: String) -> Self {
        Self {
            route_prefix: cfg.route_prefix.clone(),
            cors_origins: cfg.cors_origins.clone(),
            cors_methods: cfg.cors_methods.clone(),
            name,
        }
    }

    /// RouteKey wants the prefix without a trailing slash: `ANY /api/{proxy+}`.
    fn route_key(&self) -> String {
        let prefix = self.route_prefix.trim_end_matches('/');
        format!("ANY {prefix}/{{proxy+}}")
    }

    pub fn synthesize(&self, t: &mut Template) {
        t.add_resource(
            HTTP_API,
            "AWS::ApiGatewayV2::Api",
            json!({
                "Name": self.name,
                "ProtocolType": "HTTP",
                "CorsConfiguration": {
                    "AllowOrigins": self.cors_origins,
                    "AllowMethods": self.cors_methods,
                    "AllowHeaders": ["*"],
                },
            }),
        );

        let prefix = self.route_prefix.trim_end_matches('/');
        t.add_resource(
            API_INTEGRATION,
            "AWS::ApiGatewayV2::Integration",
            json!({
                "ApiId": r#ref(HTTP_API),
                "IntegrationType": "HTTP_PROXY",
                "IntegrationMethod": "ANY",
                "IntegrationUri": sub(&format!(
                    "http://${{{LOAD_BALANCER}.DNSName}}{prefix}/{{proxy}}"
                )),
                "PayloadFormatVersion": "1.0",
            }),
        );

        t.add_resource(
            API_ROUTE,
            "AWS::ApiGatewayV2::Route",
            json!({
                "ApiId": r#ref(HTTP_API),
                "RouteKey": self.route_key(),
                "Target": sub(&format!("integrations/${{{API_INTEGRATION}}}")),
            }),
        );

        t.add_resource(
            API_STAGE,
            "AWS::ApiGatewayV2::Stage",
            json!({
                "ApiId": r#ref(HTTP_API),
                "StageName": "$default",
                "AutoDeploy": true,
            }),
        );
    }
}
