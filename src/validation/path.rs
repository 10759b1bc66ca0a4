//! Filesystem checks for definition paths.
//!
//! Each check stops at the first problem it finds for its field. The
//! results describe the filesystem at call time only; the deploy step's own
//! failures are authoritative if anything changes afterwards.

use std::fs::{self, File, Metadata};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::definition::interpreter_path;
use crate::error::FieldError;

fn require_absolute(field: &'static str, path: &Path) -> Result<(), FieldError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(FieldError::NotAbsolute {
            field,
            path: path.to_path_buf(),
        })
    }
}

fn stat(field: &'static str, path: &Path) -> Result<Metadata, FieldError> {
    fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FieldError::PathNotFound {
            field,
            path: path.to_path_buf(),
        },
        _ => FieldError::NotReadable {
            field,
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })
}

/// Check that `path` is an absolute path to an existing directory.
pub fn check_directory(field: &'static str, path: &Path) -> Result<(), FieldError> {
    require_absolute(field, path)?;
    if !stat(field, path)?.is_dir() {
        return Err(FieldError::NotADirectory {
            field,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Check that `venv` is a virtual environment with an executable
/// `bin/python`.
pub fn check_interpreter(field: &'static str, venv: &Path) -> Result<(), FieldError> {
    check_directory(field, venv)?;

    let interpreter = interpreter_path(venv);
    let metadata = stat(field, &interpreter)?;
    if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
        return Err(FieldError::NotExecutable {
            field,
            path: interpreter,
        });
    }
    Ok(())
}

/// Check that `path` is an absolute path to a readable `.py` file.
pub fn check_python_script(field: &'static str, path: &Path) -> Result<(), FieldError> {
    require_absolute(field, path)?;

    if !stat(field, path)?.is_file() {
        return Err(FieldError::NotAFile {
            field,
            path: path.to_path_buf(),
        });
    }

    if path.extension().and_then(|ext| ext.to_str()) != Some("py") {
        return Err(FieldError::NotPythonScript {
            field,
            path: path.to_path_buf(),
        });
    }

    File::open(path).map_err(|e| FieldError::NotReadable {
        field,
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_venv(root: &Path, mode: u32) -> PathBuf {
        let venv = root.join("venv");
        fs::create_dir_all(venv.join("bin")).unwrap();
        let python = venv.join("bin/python");
        fs::write(&python, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(mode)).unwrap();
        venv
    }

    #[test]
    fn test_directory_ok() {
        let dir = TempDir::new().unwrap();
        assert!(check_directory("working_directory", dir.path()).is_ok());
    }

    #[test]
    fn test_directory_relative() {
        let result = check_directory("working_directory", Path::new("relative/dir"));
        assert!(matches!(result, Err(FieldError::NotAbsolute { .. })));
    }

    #[test]
    fn test_directory_missing() {
        let dir = TempDir::new().unwrap();
        let result = check_directory("working_directory", &dir.path().join("gone"));
        assert!(matches!(result, Err(FieldError::PathNotFound { .. })));
    }

    #[test]
    fn test_directory_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        let result = check_directory("working_directory", &file);
        assert!(matches!(result, Err(FieldError::NotADirectory { .. })));
    }

    #[test]
    fn test_interpreter_ok() {
        let dir = TempDir::new().unwrap();
        let venv = make_venv(dir.path(), 0o755);
        assert!(check_interpreter("venv_path", &venv).is_ok());
    }

    #[test]
    fn test_interpreter_not_executable() {
        let dir = TempDir::new().unwrap();
        let venv = make_venv(dir.path(), 0o644);
        let result = check_interpreter("venv_path", &venv);
        assert!(matches!(result, Err(FieldError::NotExecutable { .. })));
    }

    #[test]
    fn test_interpreter_missing() {
        let dir = TempDir::new().unwrap();
        let result = check_interpreter("venv_path", dir.path());
        match result {
            Err(FieldError::PathNotFound { field, path }) => {
                assert_eq!(field, "venv_path");
                assert!(path.ends_with("bin/python"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_script_checks() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("run.py");
        fs::write(&script, "print('hi')\n").unwrap();
        assert!(check_python_script("script_path", &script).is_ok());

        let text = dir.path().join("run.txt");
        fs::write(&text, "x").unwrap();
        assert!(matches!(
            check_python_script("script_path", &text),
            Err(FieldError::NotPythonScript { .. })
        ));

        assert!(matches!(
            check_python_script("script_path", dir.path()),
            Err(FieldError::NotAFile { .. })
        ));

        assert!(matches!(
            check_python_script("script_path", &dir.path().join("missing.py")),
            Err(FieldError::PathNotFound { .. })
        ));
    }
}
