//! Subcommand execution.

use tracing::{debug, warn};

use crate::audit::AuditLogger;
use crate::config::Settings;
use crate::error::{ServiceError, ServiceResult};
use crate::lifecycle::{CreateOptions, CreateReport, LifecycleManager, ServiceStatus};
use crate::store::DefinitionStore;
use crate::systemd::{SubprocessRunner, SystemdAdapter};
use crate::templates::TemplateEngine;

use super::args::{invoking_user, Cli, Command, CreateArgs, DefinitionArgs};

/// Assemble a manager from settings.
///
/// An audit log that cannot be opened (usually for lack of privilege) is
/// skipped rather than failing read-only commands.
pub fn build_manager(settings: &Settings) -> ServiceResult<LifecycleManager> {
    let store = DefinitionStore::new(&settings.paths.definitions_dir);
    let adapter = SystemdAdapter::with_runner(
        &settings.paths.unit_dir,
        SubprocessRunner,
        settings.systemd.adapter_options(),
    );
    let engine = TemplateEngine::new(settings.paths.templates_dir.as_deref())?;
    let manager = LifecycleManager::new(store, adapter, engine);

    if !settings.audit.enabled {
        return Ok(manager);
    }
    match AuditLogger::new(&settings.audit.log_path) {
        Ok(logger) => Ok(manager.with_audit(logger)),
        Err(e) => {
            debug!(
                path = %settings.audit.log_path.display(),
                error = %e,
                "Audit log unavailable"
            );
            Ok(manager)
        }
    }
}

/// Execute the parsed command line.
pub fn run(cli: Cli, settings: &Settings) -> ServiceResult<()> {
    let manager = build_manager(settings)?;

    match cli.command {
        Command::Create(args) => create(&manager, &args),
        Command::Preview(args) => preview(&manager, &args),
        Command::List { json } => list(&manager, json),
        Command::Status { name, json } => {
            let status = manager.status(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
            Ok(())
        }
        Command::Start { name } => {
            manager.start(&name)?;
            println!("Started {}", name);
            Ok(())
        }
        Command::Stop { name } => {
            manager.stop(&name)?;
            println!("Stopped {}", name);
            Ok(())
        }
        Command::Restart { name } => {
            manager.restart(&name)?;
            println!("Restarted {}", name);
            Ok(())
        }
        Command::Enable { name } => {
            manager.enable(&name)?;
            println!("Enabled {}", name);
            Ok(())
        }
        Command::Disable { name } => {
            manager.disable(&name)?;
            println!("Disabled {}", name);
            Ok(())
        }
        Command::Remove { name, purge } => remove(&manager, &name, purge),
        Command::Deploy { name } => {
            let path = manager.deploy_stored(&name)?;
            println!("Deployed {} to {}", name, path.display());
            Ok(())
        }
        Command::Forget { name } => {
            manager.delete_definition(&name)?;
            println!("Deleted definition {}", name);
            Ok(())
        }
    }
}

fn create(manager: &LifecycleManager, args: &CreateArgs) -> ServiceResult<()> {
    let options = CreateOptions {
        deploy: args.deploy,
        enable: args.enable,
        start: args.start,
    };
    let defs = args.definition.definitions(invoking_user())?;

    if let [def] = defs.as_slice() {
        let report = manager.create(def, options)?;
        print_report(&report);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let results = runtime.block_on(manager.create_batch(defs, options))?;

    let mut first_error = None;
    for (name, result) in results {
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                warn!(service = %name, error = %e, "Batch create failed for service");
                eprintln!("{}: {}", name, e);
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

fn preview(manager: &LifecycleManager, args: &DefinitionArgs) -> ServiceResult<()> {
    let defs = args.definitions(invoking_user())?;
    let many = defs.len() > 1;
    for def in &defs {
        let unit = manager.preview(def)?;
        if many {
            println!("# {}", manager.adapter().unit_path(&def.name).display());
        }
        print!("{}", unit);
    }
    Ok(())
}

fn list(manager: &LifecycleManager, json: bool) -> ServiceResult<()> {
    let summaries = manager.list_definitions()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No saved services");
        return Ok(());
    }

    let width = summaries
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    println!("{:<width$}  {:<15}  DESCRIPTION", "NAME", "TEMPLATE");
    for summary in &summaries {
        println!(
            "{:<width$}  {:<15}  {}",
            summary.name,
            summary.template.as_str(),
            summary.description
        );
    }
    Ok(())
}

fn remove(manager: &LifecycleManager, name: &str, purge: bool) -> ServiceResult<()> {
    let removed = match manager.remove(name) {
        Ok(()) => {
            println!("Removed unit {}", name);
            true
        }
        // --purge still clears a definition that was never deployed
        Err(ServiceError::NotFound { .. }) if purge => false,
        Err(e) => return Err(e),
    };

    if purge && (!removed || manager.store().exists(name)) {
        manager.delete_definition(name)?;
        println!("Deleted definition {}", name);
    }
    Ok(())
}

fn print_report(report: &CreateReport) {
    println!("Saved {} to {}", report.name, report.record_path.display());
    if let Some(unit_path) = &report.unit_path {
        println!("Deployed {} to {}", report.name, unit_path.display());
    }
    println!("State: {}", report.state);
}

fn print_status(status: &ServiceStatus) {
    println!("{} ({})", status.name, status.unit_path.display());
    println!("  state:      {}", status.state);
    println!("  lifecycle:  {}", status.lifecycle_state());
    println!("  deployed:   {}", yes_no(status.deployed));
    println!("  enabled:    {}", yes_no(status.enabled));
    println!("  definition: {}", if status.defined { "saved" } else { "none" });
    if let Some(pid) = status.main_pid {
        println!("  main pid:   {}", pid);
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
