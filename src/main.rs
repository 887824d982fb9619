use anyhow::{Context as _, Result};
use clap::Parser as _;
use std::fs;

use plinth::{cli, config, report, stack, validate, DeployContext, StackConfig};

fn main() -> Result<()> {
    let args = cli::Args::parse();

    if let Some(path) = &args.init {
        config::write_config_stub(path)?;
        eprintln!("wrote {}", path.display());
        return Ok(());
    }

    let mut ctx = DeployContext::new()?;

    let cfg = match ctx.locate_config(args.config.as_ref())? {
        Some(path) => StackConfig::load_from_path(&path)?,
        None => StackConfig::builtin(),
    };

    if args.dump_context {
        print!("{}", ctx.debug_dump(args.effective_redact()));
        return Ok(());
    }

    let template = stack::build(&ctx, &cfg)?;
    validate::check(&cfg, &template)?;

    if args.report != cli::ReportMode::Off {
        eprint!("{}", report::build_report(&cfg, &template, args.report));
    }

    if args.outputs {
        for (label, out) in template.outputs() {
            println!("{label}: {}", out.description);
        }
        return Ok(());
    }

    let text = if args.compact {
        template.to_json_compact()
    } else {
        template.to_json_pretty()
    }
    .context("failed to serialize template")?;

    match &args.out {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("failed to write template to {}", path.display()))?;
        }
        None => println!("{text}"),
    }

    Ok(())
}
