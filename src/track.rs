//! Checkpointing cleaned tables and recording them with DVC + git.

use std::{
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use crate::{
    frame::{Shape, Table},
    loader,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the written bytes.
    pub sha256: String,
    pub shape: Shape,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `table` as comma-separated CSV to `path` and fingerprints it.
pub fn checkpoint(table: &Table, path: &Path) -> Result<Checkpoint> {
    let text = loader::table_to_csv(table, b',')?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating checkpoint directory {parent:?}"))?;
    }
    fs::write(path, text.as_bytes()).with_context(|| format!("Writing checkpoint {path:?}"))?;
    let checkpoint = Checkpoint {
        path: path.to_path_buf(),
        sha256: sha256_hex(text.as_bytes()),
        shape: table.shape(),
    };
    info!(
        "Checkpoint {path:?} ({} x {}) sha256 {}",
        checkpoint.shape.rows, checkpoint.shape.columns, checkpoint.sha256
    );
    Ok(checkpoint)
}

/// Version-control hook for checkpoints.
pub trait Tracker {
    fn initialize(&mut self) -> Result<()>;
    fn track(&mut self, path: &Path, message: &str) -> Result<()>;
    fn push(&mut self) -> Result<()>;
}

/// Shells out to `git` and `dvc` inside `repo_dir`.
#[derive(Debug, Clone)]
pub struct DvcTracker {
    repo_dir: PathBuf,
    run_id: Uuid,
    git: OsString,
    dvc: OsString,
}

impl DvcTracker {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            run_id: Uuid::new_v4(),
            git: OsString::from("git"),
            dvc: OsString::from("dvc"),
        }
    }

    /// Replaces the `git` and `dvc` executables.
    pub fn with_programs(mut self, git: impl Into<OsString>, dvc: impl Into<OsString>) -> Self {
        self.git = git.into();
        self.dvc = dvc.into();
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn commit_message(&self, message: &str) -> String {
        format!("{message} (run {})", self.run_id)
    }

    fn run<I, S>(&self, program: &OsStr, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let rendered = std::iter::once(program)
            .chain(args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Running `{rendered}` in {:?}", self.repo_dir);
        let output = Command::new(program)
            .args(&args)
            .current_dir(&self.repo_dir)
            .output()
            .with_context(|| format!("Failed to spawn `{rendered}`"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "`{rendered}` exited with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(())
    }
}

impl Tracker for DvcTracker {
    fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(&self.repo_dir)
            .with_context(|| format!("Creating tracking directory {:?}", self.repo_dir))?;
        if !self.repo_dir.join(".git").exists() {
            self.run(&self.git, ["init"])?;
            info!("Initialised git repository in {:?}", self.repo_dir);
        }
        if !self.repo_dir.join(".dvc").exists() {
            self.run(&self.dvc, ["init"])?;
            info!("Initialised DVC in {:?}", self.repo_dir);
        }
        Ok(())
    }

    fn track(&mut self, path: &Path, message: &str) -> Result<()> {
        self.run(&self.dvc, [OsStr::new("add"), path.as_os_str()])?;
        let mut pointer = path.as_os_str().to_os_string();
        pointer.push(".dvc");
        let mut staged = vec![PathBuf::from(pointer)];
        let ignore = path
            .parent()
            .map(|dir| dir.join(".gitignore"))
            .unwrap_or_else(|| PathBuf::from(".gitignore"));
        if self.repo_dir.join(&ignore).exists() || ignore.exists() {
            staged.push(ignore);
        }
        self.run(
            &self.git,
            std::iter::once(OsString::from("add")).chain(staged.into_iter().map(PathBuf::into_os_string)),
        )?;
        let message = self.commit_message(message);
        self.run(&self.git, ["commit", "-m", message.as_str()])?;
        info!("Tracked {path:?}: {message}");
        Ok(())
    }

    fn push(&mut self) -> Result<()> {
        self.run(&self.git, ["push"])?;
        self.run(&self.dvc, ["push"])?;
        info!("Pushed git history and DVC data from {:?}", self.repo_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::Column, schema::ColumnType};
    use tempfile::tempdir;

    fn small_table() -> Table {
        Table::new(vec![Column::new(
            "x",
            ColumnType::Integer,
            vec![Some(Value::Integer(1)), Some(Value::Integer(2))],
        )])
        .unwrap()
    }

    #[test]
    fn checkpoint_digest_matches_written_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("clean.csv");
        let checkpoint = checkpoint(&small_table(), &path).unwrap();
        let written = fs::read(&path).unwrap();
        assert_eq!(written, b"x\n1\n2\n");
        assert_eq!(checkpoint.sha256, sha256_hex(&written));
        assert_eq!(checkpoint.sha256.len(), 64);
        assert_eq!(checkpoint.shape, Shape { rows: 2, columns: 1 });
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn commit_message_carries_run_id() {
        let tracker = DvcTracker::new("repo");
        let message = tracker.commit_message("clean data");
        assert_eq!(message, format!("clean data (run {})", tracker.run_id()));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_an_error() {
        let dir = tempdir().unwrap();
        let mut tracker = DvcTracker::new(dir.path()).with_programs("false", "false");
        let err = tracker.initialize().unwrap_err();
        assert!(err.to_string().contains("`false init` exited"));
    }

    #[cfg(unix)]
    #[test]
    fn successful_commands_complete_every_step() {
        let dir = tempdir().unwrap();
        let mut tracker = DvcTracker::new(dir.path()).with_programs("true", "true");
        tracker.initialize().unwrap();
        tracker.track(Path::new("clean.csv"), "checkpoint").unwrap();
        tracker.push().unwrap();
    }
}
