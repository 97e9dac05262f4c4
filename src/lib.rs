// src/lib.rs

pub mod assemble;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod grid;
pub mod logging;
pub mod pipeline;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, Parameters};
use crate::errors::{RaypatchError, Result};
use crate::exec::{ProcessRegistry, ProcessRunner};
use crate::grid::PatchCoord;
use crate::pipeline::{Pipeline, Stage, StageTemplates};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides + validation
/// - the process registry and the Ctrl-C emergency stop
/// - the pipeline controller
///
/// It is also the outermost failure handler: any error path clears the
/// registry (killing whatever is still alive) before returning.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = config::load_or_default(&args.config)?;
    apply_cli_overrides(&mut cfg, &args);
    config::validate_config(&cfg)?;

    let params = Parameters::resolve(&cfg)?;
    info!(
        "parameters:\n{}",
        serde_json::to_string_pretty(&params).context("serializing parameters")?
    );

    let patch_count = grid::partition(
        params.image_width,
        params.image_height,
        params.patch_width,
        params.patch_height,
    )
    .len();
    if patch_count == 0 {
        return Err(RaypatchError::Config(format!(
            "patch size {}x{} exceeds image size {}x{}; nothing to render",
            params.patch_width, params.patch_height, params.image_width, params.image_height
        )));
    }

    if args.dry_run {
        print_dry_run(&cfg, &params, patch_count);
        return Ok(());
    }

    let registry = Arc::new(ProcessRegistry::new());

    // Ctrl-C → kill every live patch process, then bail.
    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; killing all live patch processes");
                registry.kill_all();
                std::process::exit(130);
            }
        });
    }

    let runner = Arc::new(ProcessRunner::new(
        Arc::clone(&registry),
        params.stdout_timeout,
    ));
    let pipeline = Pipeline::new(
        params,
        StageTemplates::from_config(&cfg.stage),
        cfg.output.clone(),
        Arc::clone(&registry),
        runner,
    );

    let result = pipeline.run().await;

    // The launcher already cleans up on stage failure and nothing should be
    // running on the success path; this pass catches every other exit.
    if result.is_err() {
        registry.kill_all();
    }

    result
}

/// Fold CLI flags into the loaded config; flags win.
fn apply_cli_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(v) = args.image_width {
        cfg.render.image_width = v;
    }
    if let Some(v) = args.image_height {
        cfg.render.image_height = v;
    }
    if let Some(v) = args.patch_width {
        cfg.render.patch_width = v;
    }
    if let Some(v) = args.patch_height {
        cfg.render.patch_height = v;
    }
    if args.constexpr {
        cfg.render.constexpr = true;
    }
    if let Some(v) = args.max_depth {
        cfg.render.max_depth = v;
    }
    if let Some(v) = args.num_samples {
        cfg.render.num_samples = v;
    }
    if let Some(v) = args.random_seed {
        cfg.render.random_seed = Some(v);
    }
    if let Some(v) = args.max_workers {
        cfg.limits.max_workers = v;
    }
    if let Some(ref v) = args.stdout_timeout {
        cfg.limits.stdout_timeout = v.clone();
    }
}

/// Simple dry-run output: resolved parameters, grid, and stage commands.
fn print_dry_run(cfg: &ConfigFile, params: &Parameters, patch_count: usize) {
    let (cols, rows) = grid::grid_dims(
        params.image_width,
        params.image_height,
        params.patch_width,
        params.patch_height,
    );
    let templates = StageTemplates::from_config(&cfg.stage);
    let probe = PatchCoord::new(0, 0);

    println!("raypatch dry-run");
    println!(
        "  image: {}x{}  patch: {}x{}  grid: {}x{} ({} patches)",
        params.image_width,
        params.image_height,
        params.patch_width,
        params.patch_height,
        cols,
        rows,
        patch_count
    );
    println!(
        "  max_workers: {}  stdout_timeout: {:?}  random_seed: {}",
        params.max_workers, params.stdout_timeout, params.random_seed
    );
    println!();

    for stage in Stage::ALL {
        println!("  stage {stage}:");
        println!("    template: {}", templates.template(stage));
        println!(
            "    e.g. {probe}: {}",
            templates.render(stage, probe, params).cmd
        );
    }

    println!();
    println!("  patch output: {}", cfg.output.patch_path);
    println!("  composite:    {}", cfg.output.composite_path);
}
