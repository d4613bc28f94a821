use rlimit::{setrlimit, Resource};
use serde::{Deserialize, Serialize};

const DEFAULT_FILE_SIZE_LIMIT: u64 = 1024 * 1024 * 1024; // 1GB

/// Kernel resource limits applied to each wrapped process before exec.
/// No `RLIMIT_AS`: Go scanners reserve large virtual ranges up front and
/// abort under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub cpu_seconds: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    pub max_open_files: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_seconds: None,
            max_file_size_bytes: Some(DEFAULT_FILE_SIZE_LIMIT),
            max_open_files: None,
        }
    }
}

impl ResourceLimits {
    pub fn unlimited() -> Self {
        Self {
            cpu_seconds: None,
            max_file_size_bytes: None,
            max_open_files: None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.cpu_seconds.is_none()
            && self.max_file_size_bytes.is_none()
            && self.max_open_files.is_none()
    }

    /// Runs in the forked child; only raw syscalls happen here.
    pub fn apply(&self) -> std::io::Result<()> {
        if let Some(cpu) = self.cpu_seconds {
            setrlimit(Resource::CPU, cpu, cpu)?;
        }

        if let Some(size) = self.max_file_size_bytes {
            setrlimit(Resource::FSIZE, size, size)?;
        }

        if let Some(files) = self.max_open_files {
            setrlimit(Resource::NOFILE, files, files)?;
        }

        Ok(())
    }
}
