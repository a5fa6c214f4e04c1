//! Backend trait and implementations for talking to VirtualBox

mod local_vbox;

pub use local_vbox::{LocalVBoxBackend, LocalVBoxConfig};

use crate::error::Result;
use crate::types::{CreateVmOptions, InfoQuery, ListKind};
use std::path::Path;

/// Trait defining the VBoxManage commands vertigo issues
///
/// Every method returns VBoxManage's raw output; parsing happens on top of
/// it. Implementations other than [`LocalVBoxBackend`] are mainly useful as
/// test doubles.
pub trait VBoxBackend {
    // === Query Operations ===

    /// VirtualBox version string (`VBoxManage -v`)
    fn version(&self) -> Result<String>;

    /// Raw output of `VBoxManage list [--long] <kind>`
    fn list(&self, kind: ListKind, long: bool) -> Result<String>;

    /// Raw output for every list kind, in [`ListKind::ALL`] order
    fn list_all(&self, long: bool) -> Result<Vec<(ListKind, String)>> {
        ListKind::ALL
            .into_iter()
            .map(|kind| self.list(kind, long).map(|raw| (kind, raw)))
            .collect()
    }

    /// Raw output of `VBoxManage showvminfo` for a VM name or UUID
    fn show_vm_info(&self, id: &str, query: InfoQuery) -> Result<String>;

    // === VM Registration ===

    /// Create a VM, returning VBoxManage's report
    fn create_vm(&self, options: &CreateVmOptions) -> Result<String>;

    /// Register a VM from its settings file
    fn register_vm(&self, settings_file: &Path) -> Result<()>;

    /// Unregister a VM, optionally deleting its files
    fn unregister_vm(&self, uuid: &str, delete: bool) -> Result<()>;
}
