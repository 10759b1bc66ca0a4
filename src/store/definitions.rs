//! JSON-file definition store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::definition::{ServiceDefinition, TemplateKind};
use crate::error::{ServiceError, ServiceResult};
use crate::validation::validate_service_name;

/// Records may carry secrets in their environment, so they are owner-only.
pub const RECORD_FILE_MODE: u32 = 0o600;

const RECORD_EXTENSION: &str = "json";

/// Listing entry for a stored definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSummary {
    pub name: String,
    pub description: String,
    pub template: TemplateKind,
}

/// Directory of saved service definitions.
#[derive(Debug, Clone)]
pub struct DefinitionStore {
    dir: PathBuf,
}

impl DefinitionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<name>.json`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, RECORD_EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_service_name(name).is_ok() && self.path_for(name).is_file()
    }

    /// Save `def`, replacing any record with the same name.
    ///
    /// # Returns
    ///
    /// The path of the record.
    pub fn save(&self, def: &ServiceDefinition) -> ServiceResult<PathBuf> {
        validate_service_name(&def.name)?;

        fs::create_dir_all(&self.dir).map_err(|e| ServiceError::Store {
            message: format!(
                "failed to create definitions directory '{}': {}",
                self.dir.display(),
                e
            ),
        })?;

        let mut json = serde_json::to_string_pretty(def)?;
        json.push('\n');

        let path = self.path_for(&def.name);
        write_atomic(&path, json.as_bytes(), RECORD_FILE_MODE)?;
        info!(service = %def.name, path = %path.display(), "Definition saved");
        Ok(path)
    }

    /// Load the record for `name`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when no record exists,
    /// [`ServiceError::Store`] when it cannot be read or parsed.
    pub fn load(&self, name: &str) -> ServiceResult<ServiceDefinition> {
        validate_service_name(name)?;
        let path = self.path_for(name);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ServiceError::NotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => {
                return Err(ServiceError::Store {
                    message: format!("failed to read '{}': {}", path.display(), e),
                })
            }
        };

        let def = parse_record(&path, &content)?;
        if def.name != name {
            return Err(ServiceError::Store {
                message: format!(
                    "record '{}' is named '{}'",
                    path.display(),
                    def.name
                ),
            });
        }

        debug!(service = %name, "Definition loaded");
        Ok(def)
    }

    /// Read a definition record from an arbitrary file.
    pub fn load_from_path(path: &Path) -> ServiceResult<ServiceDefinition> {
        let content = fs::read_to_string(path).map_err(|e| ServiceError::Path {
            path: path.to_path_buf(),
            message: format!("cannot read definition: {}", e),
        })?;
        parse_record(path, &content)
    }

    /// Summaries of every readable record, sorted by name.
    ///
    /// Records that cannot be parsed are skipped with a warning. A missing
    /// directory lists as empty.
    pub fn list(&self) -> ServiceResult<Vec<DefinitionSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ServiceError::Store {
                    message: format!(
                        "failed to read definitions directory '{}': {}",
                        self.dir.display(),
                        e
                    ),
                })
            }
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            // Skips leftover temp files from interrupted writes
            let is_hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if is_hidden {
                continue;
            }

            let def = match fs::read_to_string(&path)
                .map_err(ServiceError::from)
                .and_then(|content| parse_record(&path, &content))
            {
                Ok(def) => def,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable definition");
                    continue;
                }
            };

            summaries.push(DefinitionSummary {
                template: def.template_kind(),
                name: def.name,
                description: def.description,
            });
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Delete the record for `name`.
    pub fn delete(&self, name: &str) -> ServiceResult<()> {
        validate_service_name(name)?;
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(service = %name, "Definition deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServiceError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(ServiceError::Store {
                message: format!("failed to delete '{}': {}", path.display(), e),
            }),
        }
    }
}

fn parse_record(path: &Path, content: &str) -> ServiceResult<ServiceDefinition> {
    serde_json::from_str(content).map_err(|e| ServiceError::Store {
        message: format!("invalid definition record '{}': {}", path.display(), e),
    })
}
