use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::safety;

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "target",
    "build",
    "out",
    "bin",
    ".gradle",
    "cmake-build-debug",
    "cmake-build-release",
    ".mutscope-state.json",
    ".mutscope-workspaces",
];

const SKIP_SUFFIXES: &[&str] = &[".mutscope.bak", ".o", ".obj", ".class"];

const ROOT_MARKERS: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Cargo.toml",
    "CMakeLists.txt",
    "Makefile",
    ".git",
];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Copies `src` into `dst`, leaving out `exclude` wherever it sits.
fn copy_dir_filtered(src: &Path, dst: &Path, exclude: Option<&Path>) -> std::io::Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if should_skip(&name_str) {
            continue;
        }
        let src_path = entry.path();
        if exclude.is_some_and(|e| src_path == e) {
            continue;
        }
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copied += copy_dir_filtered(&src_path, &dst_path, exclude)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
            copied += 1;
        }
        // Skip symlinks and other special files
    }
    Ok(copied)
}

/// Find the project root by walking up from `path` looking for build or VCS
/// markers. Falls back to the file's directory.
pub fn find_project_root(path: &Path) -> PathBuf {
    let start = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    let mut dir = start;
    loop {
        if ROOT_MARKERS.iter().any(|m| dir.join(m).exists()) {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    start.to_path_buf()
}

/// A private copy of the project tree owned by one worker.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    _temp_dir: Option<tempfile::TempDir>,
}

impl Workspace {
    /// A throwaway copy under the system temp directory, removed on drop.
    pub fn temporary(project_root: &Path, session_id: &str, worker: usize) -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("mutscope-{}-w{}-", session_id, worker))
            .tempdir()
            .map_err(|e| EngineError::Workspace(format!("Failed to create temp directory: {}", e)))?;
        let files = copy_dir_filtered(project_root, temp_dir.path(), None).map_err(|e| {
            EngineError::Workspace(format!(
                "Failed to copy {} for worker {}: {}",
                project_root.display(),
                worker,
                e
            ))
        })?;
        log::debug!(
            "Worker {} copied {} files into {}",
            worker,
            files,
            temp_dir.path().display()
        );
        Ok(Self {
            root: temp_dir.path().to_path_buf(),
            _temp_dir: Some(temp_dir),
        })
    }

    /// `<workspace_root>/worker-N`, kept between runs so build caches in it
    /// survive. Backups left by an interrupted run are restored first. A
    /// workspace root inside the project is left out of the copy.
    pub fn persistent(project_root: &Path, workspace_root: &Path, worker: usize) -> Result<Self> {
        let canonical = |path: &Path| {
            path.canonicalize().map_err(|e| {
                EngineError::Workspace(format!("Cannot resolve {}: {}", path.display(), e))
            })
        };
        fs::create_dir_all(workspace_root).map_err(|e| {
            EngineError::Workspace(format!("Failed to create {}: {}", workspace_root.display(), e))
        })?;
        let workspace_root = canonical(workspace_root)?;
        let project_root = canonical(project_root)?;
        if workspace_root == project_root {
            return Err(EngineError::Workspace(format!(
                "{} is the project root and cannot hold worker copies",
                workspace_root.display()
            )));
        }

        let root = workspace_root.join(format!("worker-{}", worker));
        if root.exists() {
            let restored = safety::recover_backups(&root)?;
            if !restored.is_empty() {
                log::warn!(
                    "Worker {} recovered {} file(s) from an interrupted run",
                    worker,
                    restored.len()
                );
            }
        }
        let exclude = workspace_root
            .starts_with(&project_root)
            .then_some(workspace_root.as_path());
        copy_dir_filtered(&project_root, &root, exclude).map_err(|e| {
            EngineError::Workspace(format!(
                "Failed to sync {} into {}: {}",
                project_root.display(),
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            _temp_dir: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a project-relative path lives inside this copy.
    pub fn map(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}
