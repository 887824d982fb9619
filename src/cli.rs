use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "plinth", version, about)]
pub struct Args {
    /// Path to stack.toml (overrides PLINTH_CONFIG and the XDG default)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Write the template to a file instead of stdout
    #[arg(long)]
    pub out: Option<std::path::PathBuf>,

    /// Print only the template outputs, one label per line
    #[arg(long, default_value_t = false)]
    pub outputs: bool,

    /// Compact JSON instead of pretty-printed
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Print a report about the synthesized stack
    #[arg(long, value_enum, default_value = "off")]
    pub report: ReportMode,

    /// Dump the deploy context (account/region, resolved config path, env map)
    #[arg(long, default_value_t = false)]
    pub dump_context: bool,

    /// Redact secret-like values in the context dump (default on)
    #[arg(long, default_value_t = true)]
    pub redact: bool,

    /// Disable redaction in the context dump
    #[arg(long = "no-redact", default_value_t = false)]
    pub no_redact: bool,

    /// Write a commented stack.toml stub to the given path and exit
    #[arg(long, value_name = "PATH")]
    pub init: Option<std::path::PathBuf>,
}

impl Args {
    pub fn effective_redact(&self) -> bool {
        if self.no_redact {
            false
        } else {
            self.redact
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportMode {
    Off,
    Summary,
    Full,
}
