use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

pub const DEFAULT_TOOL: &str = "ilspycmd";

#[derive(Error, Debug)]
pub enum DecompileError {
    #[error("Decompiler not found: {}", .0.display())]
    ToolNotFound(PathBuf),

    #[error("Module not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Decompiling {} failed (exit code: {}): {stderr}", .module.display(), .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    DecompileFailed {
        module: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to run decompiler on {}: {source}", .module.display())]
    Io {
        module: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Turns one binary module into a directory of source-like text files.
pub trait ModuleDecompiler: Send + Sync {
    fn decompile(&self, module: &Path, output_dir: &Path) -> Result<(), DecompileError>;
}

/// The ILSpy command-line front end.
#[derive(Debug, Clone)]
pub struct IlSpy {
    tool: PathBuf,
}

impl Default for IlSpy {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_TOOL))
    }
}

impl IlSpy {
    pub fn new(tool: PathBuf) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// An explicit path must exist; a bare name is looked up on `PATH`.
    pub fn locate(&self) -> Result<PathBuf, DecompileError> {
        if self.tool.components().count() > 1 || self.tool.is_absolute() {
            if self.tool.is_file() {
                return Ok(self.tool.clone());
            }
            return Err(DecompileError::ToolNotFound(self.tool.clone()));
        }

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        for dir in std::env::split_paths(&path_var) {
            for candidate in executable_names(&self.tool) {
                let full = dir.join(&candidate);
                if full.is_file() {
                    return Ok(full);
                }
            }
        }
        Err(DecompileError::ToolNotFound(self.tool.clone()))
    }
}

impl ModuleDecompiler for IlSpy {
    fn decompile(&self, module: &Path, output_dir: &Path) -> Result<(), DecompileError> {
        if !module.is_file() {
            return Err(DecompileError::SourceNotFound(module.to_path_buf()));
        }
        let tool = self.locate()?;

        std::fs::create_dir_all(output_dir).map_err(|source| DecompileError::Io {
            module: module.to_path_buf(),
            source,
        })?;

        log::debug!(
            "running {} on {} -> {}",
            tool.display(),
            module.display(),
            output_dir.display()
        );
        let output = Command::new(&tool)
            .arg(module)
            .arg("-p")
            .arg("-o")
            .arg(output_dir)
            .args(["--no-dead-code", "--no-dead-stores"])
            .output()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    DecompileError::ToolNotFound(tool.clone())
                } else {
                    DecompileError::Io {
                        module: module.to_path_buf(),
                        source,
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecompileError::DecompileFailed {
                module: module.to_path_buf(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

fn executable_names(tool: &Path) -> Vec<OsString> {
    let mut names = vec![tool.as_os_str().to_os_string()];
    if cfg!(windows) && tool.extension().is_none() {
        for ext in [".exe", ".cmd", ".bat"] {
            let mut name = tool.as_os_str().to_os_string();
            name.push(ext);
            names.push(name);
        }
    }
    names
}
