//! Lifecycle manager.
//!
//! Orchestrates the validator, renderer, definition store and systemd
//! adapter. The manager owns only shared handles; it is cheap to clone and
//! clones may run on worker threads.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLogger, AuditResult};
use crate::definition::ServiceDefinition;
use crate::error::{FieldError, ServiceError, ServiceResult};
use crate::store::{DefinitionStore, DefinitionSummary};
use crate::systemd::{CommandRunner, SubprocessRunner, SystemdAdapter};
use crate::templates::TemplateEngine;
use crate::validation::{validate, validate_service_name};

use super::report::{CreateOptions, CreateReport, ServiceStatus};
use super::state::LifecycleState;

/// Per-definition outcome of [`LifecycleManager::create_batch`], in input
/// order.
pub type BatchResult = Vec<(String, ServiceResult<CreateReport>)>;

/// Drives services through their lifecycle.
pub struct LifecycleManager<R = SubprocessRunner> {
    store: Arc<DefinitionStore>,
    adapter: Arc<SystemdAdapter<R>>,
    engine: TemplateEngine,
    audit: Option<Arc<AuditLogger>>,
}

impl<R> Clone for LifecycleManager<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            adapter: Arc::clone(&self.adapter),
            engine: self.engine.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<R: CommandRunner> LifecycleManager<R> {
    pub fn new(store: DefinitionStore, adapter: SystemdAdapter<R>, engine: TemplateEngine) -> Self {
        Self {
            store: Arc::new(store),
            adapter: Arc::new(adapter),
            engine,
            audit: None,
        }
    }

    /// Record mutating operations to `logger`.
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(Arc::new(logger));
        self
    }

    pub fn store(&self) -> &DefinitionStore {
        &self.store
    }

    pub fn adapter(&self) -> &SystemdAdapter<R> {
        &self.adapter
    }

    /// Run `operation`, then write an audit entry and a log line for it.
    ///
    /// `reached` is the state the service is in after a success.
    fn audited<T>(
        &self,
        operation: &str,
        service: &str,
        reached: Option<LifecycleState>,
        f: impl FnOnce() -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let started = Instant::now();
        let result = f();
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match &result {
            Ok(_) => {
                info!(
                    service = %service,
                    operation,
                    state = ?reached,
                    duration_ms,
                    "Operation completed"
                );
                AuditResult::Success { state: reached }
            }
            Err(e) => {
                warn!(service = %service, operation, error = %e, "Operation failed");
                AuditResult::from_error(e)
            }
        };

        if let Some(logger) = &self.audit {
            let entry = AuditEntry::now(operation, service, outcome, duration_ms);
            if let Err(e) = logger.log(&entry) {
                warn!(error = %e, "Failed to write audit entry");
            }
        }

        result
    }

    /// Check a definition. `Draft → Validated` on success.
    pub fn validate(&self, def: &ServiceDefinition) -> ServiceResult<LifecycleState> {
        validate(def)?;
        debug!(service = %def.name, "Definition validated");
        Ok(LifecycleState::Validated)
    }

    /// Validate and render without writing anything.
    pub fn preview(&self, def: &ServiceDefinition) -> ServiceResult<String> {
        validate(def)?;
        self.engine.render(def)
    }

    /// Validate, render and save a definition, then deploy, enable and
    /// start it as `options` ask.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Validation`] with every problem found; nothing is
    ///   written.
    /// - [`ServiceError::PermissionDenied`] before any write when the unit
    ///   directory is not writable and a deploy was requested.
    /// - [`ServiceError::Deploy`] when writing the unit or reloading fails;
    ///   the unit is rolled back and the definition stays saved.
    /// - [`ServiceError::SystemdCommand`] when the unit is not up after
    ///   `start`; the unit stays deployed.
    pub fn create(
        &self,
        def: &ServiceDefinition,
        options: CreateOptions,
    ) -> ServiceResult<CreateReport> {
        self.audited("create", &def.name, Some(options.target_state()), || {
            validate(def)?;
            let unit_text = self.engine.render(def)?;

            if options.deploys() {
                self.adapter.check_privileges()?;
            }

            let record_path = self.store.save(def)?;
            let mut report = CreateReport {
                name: def.name.clone(),
                record_path,
                unit_path: None,
                state: LifecycleState::Rendered,
            };

            if !options.deploys() {
                return Ok(report);
            }

            report.unit_path = Some(self.deploy_unit(&def.name, &unit_text)?);
            report.state = LifecycleState::Deployed;

            if options.enable {
                self.adapter.enable(&def.name)?;
                report.state = LifecycleState::Enabled;
            }
            if options.start {
                self.adapter.start(&def.name)?;
                self.adapter.confirm_running(&def.name, "start")?;
                report.state = LifecycleState::Active;
            }

            Ok(report)
        })
    }

    /// Deploy the stored definition for `name`, replacing any existing unit.
    pub fn deploy_stored(&self, name: &str) -> ServiceResult<PathBuf> {
        self.audited("deploy", name, Some(LifecycleState::Deployed), || {
            let def = self.store.load(name)?;
            validate(&def)?;
            let unit_text = self.engine.render(&def)?;
            self.deploy_unit(name, &unit_text)
        })
    }

    /// `Rendered → Deployed`: write the unit and reload systemd.
    ///
    /// Any failure after the privilege check puts the unit directory back
    /// as it was (the previous unit is restored byte for byte, a new file
    /// removed) and is reported as a deploy error in state `Validated`.
    fn deploy_unit(&self, name: &str, unit_text: &str) -> ServiceResult<PathBuf> {
        self.adapter.check_privileges()?;

        let unit_path = self.adapter.unit_path(name);
        let previous = match fs::read(&unit_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ServiceError::Path {
                    path: unit_path,
                    message: format!("cannot read existing unit for rollback: {}", e),
                })
            }
        };

        let deployed = self
            .adapter
            .write_unit(name, unit_text)
            .and_then(|path| self.adapter.reload_daemon().map(|()| path));

        match deployed {
            Ok(path) => {
                info!(service = %name, path = %path.display(), "Unit deployed");
                Ok(path)
            }
            Err(source) => {
                warn!(service = %name, error = %source, "Deploy failed, rolling back");
                self.roll_back(name, previous.as_deref());
                Err(ServiceError::Deploy {
                    state: LifecycleState::Validated,
                    source: Box::new(source),
                })
            }
        }
    }

    fn roll_back(&self, name: &str, previous: Option<&[u8]>) {
        let restored = match previous {
            Some(bytes) => self.adapter.restore_unit(name, bytes),
            None => self.adapter.delete_unit_file(name).map(|_| ()),
        };
        if let Err(e) = restored {
            warn!(service = %name, error = %e, "Rollback of unit file failed");
        }
    }

    /// Fail with `NotFound` unless `name` has a unit file.
    fn require_unit(&self, name: &str) -> ServiceResult<()> {
        validate_service_name(name)?;
        if self.adapter.unit_exists(name) {
            Ok(())
        } else {
            Err(ServiceError::NotFound {
                name: name.to_string(),
            })
        }
    }

    fn control(
        &self,
        operation: &str,
        name: &str,
        reached: LifecycleState,
        action: impl FnOnce(&SystemdAdapter<R>, &str) -> ServiceResult<()>,
    ) -> ServiceResult<()> {
        self.audited(operation, name, Some(reached), || {
            self.require_unit(name)?;
            self.adapter.check_privileges()?;
            action(self.adapter.as_ref(), name)
        })
    }

    /// Start the unit and confirm it stayed up.
    pub fn start(&self, name: &str) -> ServiceResult<()> {
        self.control("start", name, LifecycleState::Active, |a, n| {
            a.start(n)?;
            a.confirm_running(n, "start").map(|_| ())
        })
    }

    pub fn stop(&self, name: &str) -> ServiceResult<()> {
        self.control("stop", name, LifecycleState::Inactive, |a, n| a.stop(n))
    }

    pub fn restart(&self, name: &str) -> ServiceResult<()> {
        self.control("restart", name, LifecycleState::Active, |a, n| {
            a.restart(n)?;
            a.confirm_running(n, "restart").map(|_| ())
        })
    }

    pub fn enable(&self, name: &str) -> ServiceResult<()> {
        self.control("enable", name, LifecycleState::Enabled, |a, n| a.enable(n))
    }

    pub fn disable(&self, name: &str) -> ServiceResult<()> {
        self.control("disable", name, LifecycleState::Deployed, |a, n| {
            a.disable(n)
        })
    }

    /// Stop, disable and delete the unit. The stored definition is kept.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] without touching anything when there is
    /// no unit file.
    pub fn remove(&self, name: &str) -> ServiceResult<()> {
        self.control("remove", name, LifecycleState::Removed, |a, n| a.remove(n))
    }

    /// Observed status of `name`.
    ///
    /// A service with a stored definition but no unit reports state
    /// `unknown` without querying systemd.
    pub fn status(&self, name: &str) -> ServiceResult<ServiceStatus> {
        validate_service_name(name)?;
        let deployed = self.adapter.unit_exists(name);
        let defined = self.store.exists(name);
        if !deployed && !defined {
            return Err(ServiceError::NotFound {
                name: name.to_string(),
            });
        }

        let state = self.adapter.status(name)?;
        let (enabled, main_pid) = if deployed {
            let enabled = self.adapter.is_enabled(name)?;
            let main_pid = if state.is_running() {
                self.adapter.main_pid(name)?
            } else {
                None
            };
            (enabled, main_pid)
        } else {
            (false, None)
        };

        Ok(ServiceStatus {
            name: name.to_string(),
            unit_path: self.adapter.unit_path(name),
            deployed,
            defined,
            state,
            enabled,
            main_pid,
        })
    }

    pub fn list_definitions(&self) -> ServiceResult<Vec<DefinitionSummary>> {
        self.store.list()
    }

    /// Delete a stored definition. A deployed unit is left alone.
    pub fn delete_definition(&self, name: &str) -> ServiceResult<()> {
        self.audited("delete_definition", name, None, || self.store.delete(name))
    }
}

impl<R: CommandRunner + 'static> LifecycleManager<R> {
    /// Create several services, each on its own blocking worker.
    ///
    /// The whole batch is rejected up front when a name appears twice, so
    /// workers never touch the same files.
    pub async fn create_batch(
        &self,
        defs: Vec<ServiceDefinition>,
        options: CreateOptions,
    ) -> ServiceResult<BatchResult> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut duplicates = Vec::new();
        for def in &defs {
            if !seen.insert(def.name.as_str()) && reported.insert(def.name.as_str()) {
                duplicates.push(FieldError::DuplicateName {
                    name: def.name.clone(),
                });
            }
        }
        if !duplicates.is_empty() {
            return Err(ServiceError::Validation { errors: duplicates });
        }

        debug!(count = defs.len(), "Starting batch create");

        let handles: Vec<_> = defs
            .into_iter()
            .map(|def| {
                let manager = self.clone();
                let name = def.name.clone();
                let handle = tokio::task::spawn_blocking(move || manager.create(&def, options));
                (name, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                Err(ServiceError::Spawn {
                    command: format!("create {}", name),
                    message: e.to_string(),
                })
            });
            results.push((name, result));
        }

        Ok(results)
    }
}
