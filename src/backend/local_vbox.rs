//! VBoxManage backend implementation

use crate::error::{Error, Result};
use crate::types::{CreateVmOptions, InfoQuery, ListKind};
use crate::VBoxBackend;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Configuration for the local VBoxManage backend
#[derive(Debug, Clone)]
pub struct LocalVBoxConfig {
    /// VBoxManage executable (looked up on `PATH` when not absolute)
    pub program: PathBuf,
}

impl Default for LocalVBoxConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("VBoxManage"),
        }
    }
}

/// Backend that runs the local VBoxManage binary
pub struct LocalVBoxBackend {
    config: LocalVBoxConfig,
}

impl LocalVBoxBackend {
    /// Create a new LocalVBoxBackend with default configuration
    pub fn new() -> Self {
        Self::with_config(LocalVBoxConfig::default())
    }

    /// Create a new LocalVBoxBackend with custom configuration
    pub fn with_config(config: LocalVBoxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocalVBoxConfig {
        &self.config
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.config.program.display(), args.join(" "))
    }

    /// Run VBoxManage and return stdout
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(command = %self.command_line(args), "running VBoxManage");
        let output = Command::new(&self.config.program).args(args).output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(Error::CommandFailed {
                command: self.command_line(args),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

impl Default for LocalVBoxBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for `showvminfo`
fn show_vm_info_args(id: &str, query: InfoQuery) -> Vec<&str> {
    let mut args = vec!["showvminfo"];
    if query.details {
        args.push("--details");
    }
    if query.machine_readable {
        args.push("--machinereadable");
    }
    args.push(id);
    args
}

/// Arguments for `createvm`
fn create_vm_args(options: &CreateVmOptions) -> Vec<&str> {
    let mut args = vec!["createvm", "--name", options.name.as_str()];
    if let Some(ostype) = &options.ostype {
        args.extend(["--ostype", ostype.as_str()]);
    }
    if options.register {
        args.push("--register");
    }
    if let Some(basefolder) = &options.basefolder {
        args.extend(["--basefolder", basefolder.as_str()]);
    }
    if let Some(uuid) = &options.uuid {
        args.extend(["--uuid", uuid.as_str()]);
    }
    args
}

impl VBoxBackend for LocalVBoxBackend {
    fn version(&self) -> Result<String> {
        Ok(self.run(&["-v"])?.trim().to_string())
    }

    fn list(&self, kind: ListKind, long: bool) -> Result<String> {
        let mut args = vec!["list"];
        if long {
            args.push("--long");
        }
        args.push(kind.as_str());
        self.run(&args)
    }

    fn show_vm_info(&self, id: &str, query: InfoQuery) -> Result<String> {
        self.run(&show_vm_info_args(id, query))
    }

    fn create_vm(&self, options: &CreateVmOptions) -> Result<String> {
        self.run(&create_vm_args(options))
    }

    fn register_vm(&self, settings_file: &Path) -> Result<()> {
        let path = settings_file.to_string_lossy();
        match self.run(&["registervm", &*path]) {
            Ok(_) => Ok(()),
            Err(Error::CommandFailed { stderr, .. }) => Err(Error::Registration {
                path: settings_file.to_path_buf(),
                stderr,
            }),
            Err(e) => Err(e),
        }
    }

    fn unregister_vm(&self, uuid: &str, delete: bool) -> Result<()> {
        let mut args = vec!["unregistervm", uuid];
        if delete {
            args.push("--delete");
        }
        self.run(&args)?;
        Ok(())
    }
}
