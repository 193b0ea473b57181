//! CI workflow gate: every `*.yml` / `*.yaml` under a workflows directory
//! must parse as YAML.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum WorkflowLintError {
    #[error("workflow directory {0} does not exist")]
    MissingDir(PathBuf),

    #[error("no *.yml or *.yaml files in {0}")]
    NoWorkflowFiles(PathBuf),

    #[error("invalid workflow {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("bad workflow glob: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Parse every workflow file in `dir`, in sorted order, stopping at the first
/// one that fails. Returns the checked files.
pub fn validate_workflow_dir(dir: &Path) -> Result<Vec<PathBuf>, WorkflowLintError> {
    if !dir.is_dir() {
        return Err(WorkflowLintError::MissingDir(dir.to_path_buf()));
    }

    let files = workflow_files(dir)?;
    if files.is_empty() {
        return Err(WorkflowLintError::NoWorkflowFiles(dir.to_path_buf()));
    }

    for file in &files {
        lint_file(file)?;
        debug!(file = %file.display(), "Workflow parsed");
    }
    info!(dir = %dir.display(), files = files.len(), "Workflows valid");
    Ok(files)
}

fn workflow_files(dir: &Path) -> Result<Vec<PathBuf>, WorkflowLintError> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();
    for ext in ["yml", "yaml"] {
        // Unreadable entries are skipped.
        files.extend(
            glob::glob(&format!("{base}/*.{ext}"))?
                .filter_map(Result::ok)
                .filter(|p| p.is_file()),
        );
    }
    files.sort();
    Ok(files)
}

fn lint_file(path: &Path) -> Result<(), WorkflowLintError> {
    let invalid = |message: String| WorkflowLintError::Invalid {
        path: path.to_path_buf(),
        message,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    serde_yaml::from_str::<serde_yaml::Value>(&raw).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "name: CI\non:\n  push:\n    branches: [main]\njobs:\n  test:\n    runs-on: ubuntu-latest\n";

    #[test]
    fn missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_workflow_dir(&dir.path().join("workflows")).unwrap_err();
        assert!(matches!(err, WorkflowLintError::MissingDir(_)), "{err}");
    }

    #[test]
    fn dir_without_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# workflows").unwrap();
        let err = validate_workflow_dir(dir.path()).unwrap_err();
        assert!(matches!(err, WorkflowLintError::NoWorkflowFiles(_)), "{err}");
    }

    #[test]
    fn accepts_both_extensions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("release.yaml"), VALID).unwrap();
        std::fs::write(dir.path().join("ci.yml"), VALID).unwrap();

        let files = validate_workflow_dir(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["ci.yml", "release.yaml"]);
    }

    #[test]
    fn tab_indentation_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), VALID).unwrap();
        std::fs::write(dir.path().join("b.yml"), "on:\n\tpush:\n").unwrap();

        match validate_workflow_dir(dir.path()).unwrap_err() {
            WorkflowLintError::Invalid { path, .. } => {
                assert_eq!(path, dir.path().join("b.yml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stops_at_first_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), "jobs: [unclosed").unwrap();
        std::fs::write(dir.path().join("b.yml"), "also: [broken").unwrap();

        let err = validate_workflow_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("a.yml"), "{err}");
        assert!(!err.to_string().contains("b.yml"), "{err}");
    }

    #[test]
    fn repository_workflows_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../.github/workflows");
        let files = validate_workflow_dir(&dir).unwrap();
        assert!(!files.is_empty());
    }
}
