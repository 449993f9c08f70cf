//! Build script support.
//!
//! Compiles every `.fsm` file below a directory into `OUT_DIR`, keeping the
//! directory layout.

use crate::compile::{compile_file, OutputPaths};
use anyhow::Context as _;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub fn process_root() -> anyhow::Result<()> {
    let build = Build::new()?;
    build.process()
}

pub fn process_dir(root_dir: &Path) -> anyhow::Result<()> {
    let build = Build::with_root_dir(root_dir.to_owned())?;
    build.process()
}

#[derive(Debug)]
pub struct Build {
    root_dir: PathBuf,
    out_dir: PathBuf,
}

impl Build {
    pub fn new() -> anyhow::Result<Self> {
        let root_dir = env::var_os("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .context("The environment variable `CARGO_MANIFEST_DIR' is not set")?;
        Self::with_root_dir(root_dir)
    }

    pub fn with_root_dir(root_dir: PathBuf) -> anyhow::Result<Self> {
        let out_dir = env::var_os("OUT_DIR")
            .map(PathBuf::from)
            .context("The environment variable `OUT_DIR' is not set")?;
        Ok(Self::with_dirs(root_dir, out_dir))
    }

    pub fn with_dirs(root_dir: PathBuf, out_dir: PathBuf) -> Self {
        Self { root_dir, out_dir }
    }

    pub fn process(&self) -> anyhow::Result<()> {
        for entry in WalkDir::new(&self.root_dir).sort_by_file_name() {
            let entry = entry.context("from WalkDir entry")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let in_file = entry.path();
            if entry.path().starts_with(&self.out_dir) {
                continue;
            }
            match in_file.extension().and_then(|ext| ext.to_str()) {
                Some("fsm") => self.process_file(in_file)?,
                _ => continue,
            }
        }

        Ok(())
    }

    fn process_file(&self, in_file: &Path) -> anyhow::Result<()> {
        let relative = in_file.strip_prefix(&self.root_dir)?;
        let out_dir = match relative.parent() {
            Some(parent) => self.out_dir.join(parent),
            None => self.out_dir.clone(),
        };
        fs::create_dir_all(&out_dir)?;

        println!("cargo:rerun-if-changed={}", in_file.display());

        let artifacts = compile_file(in_file)?.artifacts;
        let paths = OutputPaths::new(in_file, Some(&out_dir))?;
        fs::write(&paths.header, artifacts.header)?;
        fs::write(&paths.source, artifacts.source)?;
        fs::write(&paths.graph, artifacts.graph)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_every_fsm_file_below_root() {
        let scratch = env::temp_dir().join(format!("fsmc-build-{}", std::process::id()));
        let root = scratch.join("src");
        let out = scratch.join("out");
        fs::create_dir_all(root.join("machines")).unwrap();
        fs::write(
            root.join("machines/lamp.fsm"),
            "fsm Lamp { class Ctx as ctx; Off { on => On; } On { off => Off; } }",
        )
        .unwrap();
        fs::write(root.join("notes.txt"), "not a machine").unwrap();

        Build::with_dirs(root, out.clone()).process().unwrap();

        let header = fs::read_to_string(out.join("machines/lamp.h")).unwrap();
        assert!(header.contains("class Lamp {"));
        assert!(out.join("machines/lamp.cpp").exists());
        assert!(out.join("machines/lamp.dot").exists());
        assert!(!out.join("notes.h").exists());

        fs::remove_dir_all(&scratch).unwrap();
    }
}
