use anyhow::{bail, Context as _, Result};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    process::Command,
};

/// Everything the synthesizer needs to know about where it is running:
/// the target account and region, the resource name prefix, and a snapshot
/// of the process environment for token resolution and the context dump.
#[derive(Debug, Clone)]
pub struct DeployContext {
    pub vars: BTreeMap<String, String>,
    secret_keys: BTreeSet<String>,

    account: String,
    region: String,
    prefix: String,
    host: String,

    home: PathBuf,
    xdg_config_home: PathBuf,

    config_path: Option<PathBuf>,
}

impl DeployContext {
    pub fn new() -> Result<Self> {
        let vars: BTreeMap<String, String> = std::env::vars().collect();
        Self::from_vars(vars)
    }

    /// Build from an explicit variable map. Account/region precedence:
    /// 1) PLINTH_ACCOUNT / PLINTH_REGION
    /// 2) CDK_DEFAULT_ACCOUNT / CDK_DEFAULT_REGION (drop-in for cdk pipelines)
    /// 3) AWS_REGION (region only)
    pub fn from_vars(mut vars: BTreeMap<String, String>) -> Result<Self> {
        let account = first_present(&vars, &["PLINTH_ACCOUNT", "CDK_DEFAULT_ACCOUNT"])
            .context("target account not set (PLINTH_ACCOUNT or CDK_DEFAULT_ACCOUNT)")?;

        let region = first_present(
            &vars,
            &["PLINTH_REGION", "CDK_DEFAULT_REGION", "AWS_REGION"],
        )
        .context("target region not set (PLINTH_REGION, CDK_DEFAULT_REGION or AWS_REGION)")?;

        let prefix =
            first_present(&vars, &["PLINTH_PREFIX"]).unwrap_or_else(|| "plinth".to_string());

        let host = detect_hostname(&vars).unwrap_or_else(|| "unknown".to_string());

        let home = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
            .context("could not determine home directory")?;

        let xdg_config_home = match vars
            .get("XDG_CONFIG_HOME")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
        {
            Some(s) => PathBuf::from(s),
            None => home.join(".config"),
        };

        vars.insert("PLINTH_ACCOUNT".to_string(), account.clone());
        vars.insert("PLINTH_REGION".to_string(), region.clone());
        vars.insert("PLINTH_PREFIX".to_string(), prefix.clone());

        Ok(Self {
            vars,
            secret_keys: BTreeSet::new(),
            account,
            region,
            prefix,
            host,
            home,
            xdg_config_home,
            config_path: None,
        })
    }

    // ---------- public getters ----------

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Availability zone names for the target region, in suffix order
    /// (`eu-west-1a`, `eu-west-1b`, ...).
    pub fn availability_zones(&self, count: usize) -> Vec<String> {
        const SUFFIXES: &[char] = &['a', 'b', 'c', 'd', 'e', 'f'];
        SUFFIXES
            .iter()
            .take(count)
            .map(|s| format!("{}{}", self.region, s))
            .collect()
    }

    pub fn default_config_path(&self) -> PathBuf {
        self.xdg_config_home.join("plinth").join("stack.toml")
    }

    // ---------- locating the config (simple contract) ----------

    /// Config path precedence:
    /// 1) CLI --config (must exist)
    /// 2) PLINTH_CONFIG (must exist)
    /// 3) ./stack.toml (if present)
    /// 4) XDG_CONFIG_HOME/plinth/stack.toml (if present)
    ///
    /// Returns None when no config file exists anywhere; the caller falls
    /// back to built-in defaults.
    pub fn locate_config(&mut self, cli_config: Option<&PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(p) = cli_config {
            if !p.exists() {
                bail!(
                    "--config was provided but file does not exist: {}",
                    p.display()
                );
            }
            self.set_config_path(p.clone());
            return Ok(Some(p.clone()));
        }

        if let Some(p) = self.get_env_path("PLINTH_CONFIG") {
            if !p.exists() {
                bail!(
                    "PLINTH_CONFIG is set but file does not exist: {}",
                    p.display()
                );
            }
            self.set_config_path(p.clone());
            return Ok(Some(p));
        }

        let local = PathBuf::from("stack.toml");
        if local.exists() {
            self.set_config_path(local.clone());
            return Ok(Some(local));
        }

        let fallback = self.default_config_path();
        if fallback.exists() {
            self.set_config_path(fallback.clone());
            return Ok(Some(fallback));
        }

        Ok(None)
    }

    fn set_config_path(&mut self, path: PathBuf) {
        self.vars.insert(
            "PLINTH_CONFIG".to_string(),
            path.to_string_lossy().to_string(),
        );
        self.config_path = Some(path);
    }

    fn get_env_path(&self, key: &str) -> Option<PathBuf> {
        self.vars
            .get(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    // ---------- context dump ----------

    pub fn debug_dump(&self, redact: bool) -> String {
        let mut out = String::new();

        out.push_str("plinth deploy context (debug)\n");
        out.push_str("=============================\n");

        out.push_str(&format!(
            "account: {}\n",
            redact_account(&self.account, redact)
        ));
        out.push_str(&format!("region: {}\n", self.region));
        out.push_str(&format!("prefix: {}\n", self.prefix));
        out.push_str(&format!("host: {}\n", self.host));
        out.push_str(&format!("home: {}\n", self.home.to_string_lossy()));

        out.push_str(&format!(
            "config_path: {}\n",
            self.config_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| "<built-in defaults>".to_string())
        ));

        out.push_str("\nvars:\n");
        for (k, v) in &self.vars {
            let should_redact = redact && (looks_sensitive_key(k) || self.secret_keys.contains(k));
            if should_redact {
                out.push_str(&format!("  {} = <redacted>\n", k));
            } else {
                out.push_str(&format!("  {} = {}\n", k, v));
            }
        }

        out
    }
}

// -------------------- helpers --------------------

fn first_present(vars: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Some(v) = vars.get(*k).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            return Some(v.to_string());
        }
    }
    None
}

fn detect_hostname(vars: &BTreeMap<String, String>) -> Option<String> {
    if let Some(h) = vars.get("HOSTNAME") {
        let h = h.trim();
        if !h.is_empty() {
            return Some(short_hostname(h));
        }
    }

    if let Some(h) = vars.get("COMPUTERNAME") {
        let h = h.trim();
        if !h.is_empty() {
            return Some(short_hostname(h));
        }
    }

    try_hostname_cmd(&["-s"])
        .or_else(|| try_hostname_cmd(&[]))
        .map(|h| short_hostname(&h))
}

fn try_hostname_cmd(args: &[&str]) -> Option<String> {
    let out = Command::new("hostname").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn short_hostname(h: &str) -> String {
    h.split('.').next().unwrap_or(h).to_string()
}

fn redact_account(account: &str, redact: bool) -> String {
    if !redact || account.len() <= 4 {
        return account.to_string();
    }
    format!("...{}", &account[account.len() - 4..])
}

fn looks_sensitive_key(k: &str) -> bool {
    let u = k.to_ascii_uppercase();
    u.contains("TOKEN")
        || u.contains("SECRET")
        || u.contains("PASSWORD")
        || u.contains("PRIVATE")
        || u.contains("CREDENTIAL")
        || u == "AWS_SESSION_TOKEN"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn account_and_region_precedence() {
        let ctx = DeployContext::from_vars(vars(&[
            ("PLINTH_ACCOUNT", "111122223333"),
            ("CDK_DEFAULT_ACCOUNT", "999999999999"),
            ("CDK_DEFAULT_REGION", "eu-west-1"),
            ("AWS_REGION", "us-east-2"),
        ]))
        .unwrap();

        assert_eq!(ctx.account(), "111122223333");
        assert_eq!(ctx.region(), "eu-west-1");
    }

    #[test]
    fn missing_account_is_an_error() {
        let err = DeployContext::from_vars(vars(&[("AWS_REGION", "us-east-1")]))
            .err()
            .expect("should fail without an account");
        assert!(err.to_string().contains("account"));
    }

    #[test]
    fn availability_zones_follow_region() {
        let ctx = DeployContext::from_vars(vars(&[
            ("PLINTH_ACCOUNT", "111122223333"),
            ("PLINTH_REGION", "ap-southeast-2"),
        ]))
        .unwrap();

        assert_eq!(
            ctx.availability_zones(2),
            vec!["ap-southeast-2a".to_string(), "ap-southeast-2b".to_string()]
        );
    }

    #[test]
    fn hostname_comes_from_env_and_is_shortened() {
        let ctx = DeployContext::from_vars(vars(&[
            ("PLINTH_ACCOUNT", "111122223333"),
            ("PLINTH_REGION", "us-east-1"),
            ("HOSTNAME", "build-runner-07.internal.example.com"),
        ]))
        .unwrap();

        assert_eq!(ctx.host(), "build-runner-07");
    }

    #[test]
    fn dump_redacts_sensitive_vars_and_account() {
        let ctx = DeployContext::from_vars(vars(&[
            ("PLINTH_ACCOUNT", "111122223333"),
            ("PLINTH_REGION", "us-east-1"),
            ("MY_API_TOKEN", "hunter2"),
        ]))
        .unwrap();

        let dump = ctx.debug_dump(true);
        assert!(dump.contains("MY_API_TOKEN = <redacted>"));
        assert!(dump.contains("account: ...3333"));
        assert!(!dump.contains("hunter2"));
    }
}
