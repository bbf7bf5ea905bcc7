//! Common test utilities for aectl CLI tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated working directory holding a profile file
pub struct TestEnv {
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            temp_dir: tempdir()?,
        })
    }

    /// Path of a file inside the test directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Write the default `.agent-engine.yml`
    pub fn write_profiles(&self, yaml: &str) -> anyhow::Result<PathBuf> {
        let path = self.file(".agent-engine.yml");
        std::fs::write(&path, yaml)?;
        Ok(path)
    }

    /// Command running inside the test directory with a clean environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_aectl"));
        cmd.current_dir(self.temp_dir.path());
        cmd.env("HOME", self.temp_dir.path());
        for var in [
            "GOOGLE_CLOUD_PROJECT",
            "GOOGLE_CLOUD_LOCATION",
            "GOOGLE_CLOUD_STAGING_BUCKET",
            "GOOGLE_OAUTH_ACCESS_TOKEN",
            "AECTL_MODULES",
            "AECTL_API_ENDPOINT",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}

/// Profiles pointing at project `p` in `us-central1`
pub const PROFILES: &str = r#"
default:
  display_name: agent-a
  vertex_ai:
    project: p
    location: us-central1

prod:
  display_name: agent-prod
"#;

/// Collection path the CLI lists for [`PROFILES`]
pub const ENGINES_PATH: &str = "/v1beta1/projects/p/locations/us-central1/reasoningEngines";
