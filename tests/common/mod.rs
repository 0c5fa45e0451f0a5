#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use phenoetl::model::{Column, Table};
use tempfile::{TempDir, tempdir};

pub const TERMS: &str = "\
# id\tlabel
HP:0001250\tSeizure
HP:0001263\tGlobal developmental delay
HP:0000252\tMicrocephaly
HP:0001251\tAtaxia
";

/// Scratch directory that cleans up its files on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a cohort CSV and loads it into `session.json`.
    pub fn load_session(&self, csv: &str) -> PathBuf {
        let input = self.write("cohort.csv", csv);
        let session = self.join("session.json");
        phenoetl_cmd()
            .args(["load", "-i", arg(&input), "-s", arg(&session)])
            .assert()
            .success();
        session
    }
}

pub fn phenoetl_cmd() -> Command {
    Command::cargo_bin("phenoetl").expect("binary exists")
}

pub fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

/// Builds a table from `(header, values)` pairs.
pub fn table(columns: &[(&str, &[&str])]) -> Table {
    let columns = columns
        .iter()
        .map(|(header, values)| Column::new(*header, values.iter().copied()))
        .collect();
    Table::new("cohort.csv", columns).expect("valid table")
}
