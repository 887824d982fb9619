use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::context::DeployContext;

/// Resolves `{token}` placeholders in resource names and config values
/// against the deploy context. Unknown tokens are a hard error so a typo in
/// `stack.toml` never reaches the synthesized template.
pub struct Resolver<'a> {
    pub ctx: &'a DeployContext,
    pub env: &'a BTreeMap<String, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self {
            ctx,
            env: &ctx.vars,
        }
    }

    pub fn resolve(&self, input: &str) -> Result<String> {
        // Fast path
        if !input.contains('{') {
            return Ok(input.to_string());
        }

        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let Some(close) = after.find('}') else {
                bail!("unclosed token in string: {input}");
            };

            let token = &after[..close];
            let repl = self
                .token_value(token)
                .ok_or_else(|| anyhow::anyhow!("unknown token: {{{token}}} in: {input}"))?;

            out.push_str(&repl);
            rest = &after[close + 1..];
        }
        out.push_str(rest);

        Ok(out)
    }

    fn token_value(&self, token: &str) -> Option<String> {
        // env.* reaches into the raw environment snapshot
        if let Some(rest) = token.strip_prefix("env.") {
            return self.env.get(rest).cloned();
        }

        match token {
            "prefix" => Some(self.ctx.prefix().to_string()),
            "account" => Some(self.ctx.account().to_string()),
            "region" => Some(self.ctx.region().to_string()),
            "host" => Some(self.ctx.host().to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx() -> DeployContext {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        vars.insert("PLINTH_PREFIX".to_string(), "demo".to_string());
        vars.insert("TEAM".to_string(), "platform".to_string());
        DeployContext::from_vars(vars).unwrap()
    }

    #[test]
    fn resolves_context_tokens() {
        let ctx = ctx();
        let r = Resolver::new(&ctx);
        assert_eq!(r.resolve("{prefix}-alb").unwrap(), "demo-alb");
        assert_eq!(
            r.resolve("{prefix}-{region}-assets").unwrap(),
            "demo-us-east-1-assets"
        );
    }

    #[test]
    fn resolves_host_token() {
        let mut vars = BTreeMap::new();
        vars.insert("PLINTH_ACCOUNT".to_string(), "111122223333".to_string());
        vars.insert("PLINTH_REGION".to_string(), "us-east-1".to_string());
        vars.insert("PLINTH_PREFIX".to_string(), "demo".to_string());
        vars.insert("HOSTNAME".to_string(), "deploy-box.corp.example".to_string());
        let ctx = DeployContext::from_vars(vars).unwrap();

        let r = Resolver::new(&ctx);
        assert_eq!(r.resolve("{prefix}-{host}-alb").unwrap(), "demo-deploy-box-alb");
    }

    #[test]
    fn multibyte_text_survives_resolution() {
        let ctx = ctx();
        let r = Resolver::new(&ctx);
        assert_eq!(
            r.resolve("€-{prefix}-bücket-日本").unwrap(),
            "€-demo-bücket-日本"
        );
    }

    #[test]
    fn resolves_env_tokens() {
        let ctx = ctx();
        let r = Resolver::new(&ctx);
        assert_eq!(r.resolve("{env.TEAM}-bucket").unwrap(), "platform-bucket");
    }

    #[test]
    fn unknown_token_is_an_error() {
        let ctx = ctx();
        let r = Resolver::new(&ctx);
        assert!(r.resolve("{nope}").is_err());
    }

    #[test]
    fn unclosed_token_is_an_error() {
        let ctx = ctx();
        let r = Resolver::new(&ctx);
        assert!(r.resolve("{prefix-alb").is_err());
    }
}
