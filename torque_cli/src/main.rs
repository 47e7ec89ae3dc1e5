mod cli;
mod error_fmt;
mod logging;
mod persist;
mod run;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;
use torque_core::{ProfileCatalog, ToleranceProfile, ToolKind};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = %e, "command failed");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    let catalog = load_catalog(&cfg, cli.profiles_csv.as_deref())?;

    match cli.cmd {
        Commands::Run {
            profile,
            input,
            baud,
            out,
            summary_out,
            max_run_ms,
            until_complete,
            simulate,
            live,
        } => {
            let args = run::RunArgs {
                profile,
                input,
                baud,
                out,
                summary_out,
                max_run_ms,
                until_complete,
                simulate,
                live,
            };
            run::run(&cfg, &catalog, args, cli.json)?;
        }
        Commands::Profiles => list_profiles(&catalog, cli.json),
        Commands::Suggest { max_rating, kind } => {
            suggest(max_rating, kind, cfg.session.tolerance, cli.json)?;
        }
        Commands::SelfCheck => {
            tracing::info!(profiles = catalog.len(), "self-check passed");
            println!("ok");
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<torque_config::Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file missing; using built-in defaults");
        return Ok(torque_config::Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = torque_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

fn load_catalog(
    cfg: &torque_config::Config,
    csv: Option<&Path>,
) -> eyre::Result<ProfileCatalog> {
    let Some(path) = csv else {
        return ProfileCatalog::from_config(cfg);
    };
    let rows = torque_config::load_profiles_csv(path)?;
    let mut catalog = ProfileCatalog::default();
    for (idx, p) in rows.iter().enumerate() {
        p.validate(idx)?;
        catalog
            .insert(ToleranceProfile::from_cfg(p, cfg.session.tolerance))
            .map_err(eyre::Report::new)?;
    }
    tracing::info!(path = %path.display(), profiles = catalog.len(), "profiles loaded from CSV");
    Ok(catalog)
}

fn list_profiles(catalog: &ProfileCatalog, json: bool) {
    for (idx, p) in catalog.list().iter().enumerate() {
        if json {
            let ranges: Vec<_> = p
                .ranges
                .iter()
                .map(|r| json!({"target": r.target, "low": r.low, "high": r.high, "label": r.label}))
                .collect();
            println!(
                "{}",
                json!({"index": idx, "name": p.display_name(), "unit": p.unit, "ranges": ranges})
            );
        } else {
            let labels: Vec<String> = p
                .ranges
                .iter()
                .map(|r| format!("{} @ {}", r.label, r.target))
                .collect();
            println!("{idx}: {} [{}]", p.display_name(), labels.join(", "));
        }
    }
}

fn suggest(max_rating: f64, kind: ToolKind, tolerance: f64, json: bool) -> eyre::Result<()> {
    if !(max_rating.is_finite() && max_rating > 0.0) {
        eyre::bail!("--max-rating must be > 0, got {max_rating}");
    }
    let profile = ToleranceProfile::suggested(max_rating, kind, "ft/lbs", tolerance);
    for r in &profile.ranges {
        if json {
            println!(
                "{}",
                json!({"target": r.target, "low": r.low, "high": r.high, "label": r.label})
            );
        } else {
            println!("{:>8.1}  {}", r.target, r.label);
        }
    }
    Ok(())
}
