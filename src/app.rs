//! Application orchestrator.
//! Loads/merges config, initializes logging, installs signal handlers, and
//! dispatches the chosen subcommand to the engine.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use crate::cli::{Args, Command, RunArgs};
use crate::config::{
    default_config_path, ensure_default_config_exists, load_config_from_default_xml,
    load_config_from_xml_env, Config, CONFIG_ENV,
};
use crate::engine::{Organizer, OrganizeRequest, PlannedRun};
use crate::errors::EngineError;
use crate::executor::{ExecMode, ExecutionResult, ProgressUpdate};
use crate::history::RollbackResult;
use crate::logging::init_tracing;
use crate::output as out;
use crate::utils::is_writable_probe;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init.
    if args.print_config {
        print_config_location();
        return Ok(());
    }

    // Create template config if none exists (before logging init).
    if let Some(path) = ensure_default_config_exists() {
        out::print_success(&format!(
            "A template shutterbatch config was written to: {}",
            path.display()
        ));
        out::print_info(
            "Edit it to set defaults (batch_cap, sort_order, prefix, log_file), then re-run.",
        );
        return Ok(());
    }

    // Build config: XML (env path wins over default path), then CLI overrides.
    let mut cfg = match load_config_from_xml_env()? {
        Some(c) => c,
        None => load_config_from_default_xml()?.unwrap_or_default(),
    };
    args.apply_overrides(&mut cfg);
    cfg.validate()?;

    // Initialize logging and capture the guard so we can drop it on signal.
    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)
        .inspect_err(|e| out::print_error(&format!("Failed to initialize logging: {e}")))?;

    let organizer = Arc::new(Organizer::new(&cfg.data_dir).with_exec_options(cfg.exec_options()));

    // Guard needs to be dropped on SIGINT to flush logs.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        let cancel = organizer.cancel_token();
        ctrlc::set_handler(move || {
            cancel.cancel();
            out::print_warn("Received interrupt; finishing in-flight files...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take(); // drop guard here to flush tracing_appender
            }
        })
        .map_err(|e| anyhow!("failed to install signal handler: {e}"))?;
    }

    debug!(?args, "starting shutterbatch");

    let result = dispatch(&args, &cfg, &organizer);

    // Ensure logs are flushed before exit.
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn dispatch(args: &Args, cfg: &Config, organizer: &Organizer) -> Result<()> {
    match &args.command {
        None => {
            out::print_info("No command given; try `shutterbatch plan <SOURCE> <OUTPUT>` or --help.");
            Ok(())
        }
        Some(Command::Plan(run)) => cmd_plan(cfg, organizer, run),
        Some(Command::Run(run)) => cmd_run(cfg, organizer, run),
        Some(Command::Resume) => cmd_resume(organizer),
        Some(Command::Discard) => cmd_discard(organizer),
        Some(Command::Rollback { id }) => cmd_rollback(organizer, *id),
        Some(Command::History) => cmd_history(organizer),
        Some(Command::Forget { id }) => {
            organizer.delete_history_entry(*id)?;
            out::print_success("History entry deleted.");
            Ok(())
        }
        Some(Command::ClearHistory) => {
            organizer.clear_history()?;
            out::print_success("History cleared.");
            Ok(())
        }
    }
}

fn print_config_location() {
    if let Ok(cfg_env) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {cfg_env}\n"));
        out::print_info(&format!(
            "To override, unset {CONFIG_ENV} or set it to another file."
        ));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default shutterbatch config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info(
                    "No config file exists there yet. Run any command to create a template.",
                );
            }
        }
        None => out::print_error("Could not determine a default config path."),
    }
}

fn build_request(cfg: &Config, run: &RunArgs) -> OrganizeRequest {
    OrganizeRequest {
        source_dir: run.source.clone(),
        output_dir: run.output.clone(),
        mode: if run.move_files {
            ExecMode::Move
        } else {
            ExecMode::Copy
        },
        cap: cfg.batch_cap,
        prefix: cfg.prefix.clone(),
        sort_order: cfg.sort_order,
    }
}

fn warn_if_interrupted(organizer: &Organizer) {
    if let Some(summary) = organizer.check_interrupted() {
        out::print_warn(&format!(
            "An interrupted {} run from {} exists ({}/{} files done). Use `resume` to finish it or `discard` to forget it.",
            summary.mode,
            summary.started_at.format("%Y-%m-%d %H:%M"),
            summary.processed,
            summary.total
        ));
    }
}

fn print_plan(planned: &PlannedRun) {
    out::print_user(&format!(
        "{} eligible files -> {} batch folder(s):",
        planned.plan.total_files,
        planned.batches.len()
    ));
    for b in &planned.batches {
        out::print_user(&format!("  {}  ({} files)", b.folder, b.file_count));
    }
    for base in &planned.plan.oversized {
        out::print_warn(&format!(
            "Group '{base}' exceeds the cap on its own and gets a whole batch folder."
        ));
    }
}

fn cmd_plan(cfg: &Config, organizer: &Organizer, run: &RunArgs) -> Result<()> {
    warn_if_interrupted(organizer);
    let planned = organizer.plan(&build_request(cfg, run))?;
    if planned.plan.is_empty() {
        out::print_info("Nothing to do: no eligible files in the source folder.");
        return Ok(());
    }
    print_plan(&planned);
    out::print_info("This was a dry run; use `run` to execute.");
    Ok(())
}

fn cmd_run(cfg: &Config, organizer: &Organizer, run: &RunArgs) -> Result<()> {
    if organizer.check_interrupted().is_some() {
        warn_if_interrupted(organizer);
        return Err(anyhow!(
            "refusing to start a new run while an interrupted one exists"
        ));
    }

    let planned = organizer.plan(&build_request(cfg, run))?;
    if planned.plan.is_empty() {
        out::print_info("Nothing to do: no eligible files in the source folder.");
        return Ok(());
    }
    print_plan(&planned);
    is_writable_probe(&run.output).map_err(|e| {
        anyhow!(
            "output folder '{}' is not writable: {}",
            run.output.display(),
            e
        )
    })?;

    let on_progress = |p: ProgressUpdate| {
        if p.complete {
            out::finish_progress_line();
        } else {
            out::print_progress_line(&format!(
                "  {:>3}% ({}/{})",
                p.percent(),
                p.processed,
                p.total
            ));
        }
    };
    let result = organizer.execute(&planned, Some(&on_progress))?;
    report_execution(&result);
    if result.cancelled {
        out::print_info("Run interrupted; use `resume` to finish or `discard` to forget it.");
    } else if planned.request.mode == ExecMode::Move {
        out::print_info("Use `rollback` to undo this run.");
    }
    Ok(())
}

fn cmd_resume(organizer: &Organizer) -> Result<()> {
    let Some(summary) = organizer.check_interrupted() else {
        out::print_info("No interrupted run to resume.");
        return Ok(());
    };
    out::print_info(&format!(
        "Resuming {} run from {} ({}/{} files done)...",
        summary.mode,
        summary.started_at.format("%Y-%m-%d %H:%M"),
        summary.processed,
        summary.total
    ));

    let on_progress = |p: ProgressUpdate| {
        if p.complete {
            out::finish_progress_line();
        } else {
            out::print_progress_line(&format!(
                "  {:>3}% ({}/{})",
                p.percent(),
                p.processed,
                p.total
            ));
        }
    };
    let result = organizer.resume(Some(&on_progress))?;
    report_execution(&result);
    Ok(())
}

fn cmd_discard(organizer: &Organizer) -> Result<()> {
    match organizer.discard_interrupted() {
        Ok(()) => {
            out::print_success("Interrupted run discarded.");
            Ok(())
        }
        Err(e) => {
            if matches!(
                e.downcast_ref::<EngineError>(),
                Some(EngineError::NothingToResume)
            ) {
                out::print_info("No interrupted run to discard.");
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

fn cmd_rollback(organizer: &Organizer, id: Option<uuid::Uuid>) -> Result<()> {
    let result = match id {
        Some(id) => organizer.rollback_history_entry(id),
        None => organizer.rollback(),
    };
    match result {
        Ok(rb) => {
            report_rollback(&rb);
            Ok(())
        }
        Err(e) => {
            if let Some(engine_err) = e.downcast_ref::<EngineError>() {
                error!(code = engine_err.code(), "rollback failed");
            }
            Err(e)
        }
    }
}

fn cmd_history(organizer: &Organizer) -> Result<()> {
    let entries = organizer.history()?;
    if entries.is_empty() {
        out::print_info("No move runs in history.");
        return Ok(());
    }
    for e in &entries {
        out::print_user(&format!(
            "{}  {}  {} files in {} folder(s)  -> {}",
            e.recorded_at.format("%Y-%m-%d %H:%M"),
            e.operation_id,
            e.file_count,
            e.batch_count,
            e.output_dir.display()
        ));
    }
    Ok(())
}

fn report_execution(result: &ExecutionResult) {
    info!(
        processed = result.processed_files,
        batches = result.batches_created,
        errors = result.error_count(),
        cancelled = result.cancelled,
        "run finished"
    );
    if result.has_errors() {
        out::print_warn(&format!("{} file(s) failed:", result.error_count()));
        for e in &result.errors {
            out::print_user(&format!("  {}: {}", e.file, e.error));
        }
    }
    if result.cancelled {
        out::print_warn(&format!(
            "Cancelled after {} of the planned files.",
            result.processed_files
        ));
    } else {
        out::print_success(&format!(
            "{} file(s) organized into {} batch folder(s).",
            result.processed_files, result.batches_created
        ));
    }
}

fn report_rollback(rb: &RollbackResult) {
    if rb.is_complete() {
        out::print_success(&format!(
            "Restored {} file(s); removed {} empty batch folder(s).",
            rb.restored, rb.removed_folders
        ));
    } else {
        out::print_warn(&format!(
            "Restored {} file(s), {} failed:",
            rb.restored,
            rb.failed.len()
        ));
        for e in &rb.failed {
            out::print_user(&format!("  {}: {}", e.file, e.error));
        }
    }
}
