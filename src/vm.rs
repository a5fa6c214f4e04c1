//! A registered VirtualBox VM and its parsed info

use crate::backend::VBoxBackend;
use crate::error::{Error, Result};
use crate::parser::parse_record;
use crate::types::{CreateVmOptions, InfoQuery, ParseMode, Record, Value, VmIdentity};
use tracing::{debug, warn};

/// Key under which [`Vm::refresh`] exposes the raw `showvminfo` output
pub const RAW_TEXT_KEY: &str = "string";

/// A validated request for a VM that has not been looked up yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmLookup {
    name: Option<String>,
    uuid: Option<String>,
}

impl VmLookup {
    /// Empty strings count as absent. Fails with [`Error::UnknownVm`] when
    /// neither identifier is given.
    pub fn new(name: Option<&str>, uuid: Option<&str>) -> Result<Self> {
        let name = name.filter(|n| !n.is_empty()).map(str::to_string);
        let uuid = uuid.filter(|u| !u.is_empty()).map(str::to_string);

        if name.is_none() && uuid.is_none() {
            return Err(Error::UnknownVm {
                name: String::new(),
                uuid: String::new(),
            });
        }
        Ok(Self { name, uuid })
    }

    pub fn by_name(name: &str) -> Result<Self> {
        Self::new(Some(name), None)
    }

    pub fn by_uuid(uuid: &str) -> Result<Self> {
        Self::new(None, Some(uuid))
    }

    /// The identifier handed to VBoxManage; the name wins over the UUID
    pub fn identifier(&self) -> &str {
        self.name
            .as_deref()
            .or(self.uuid.as_deref())
            .unwrap_or_default()
    }

    fn unknown(&self) -> Error {
        Error::UnknownVm {
            name: self.name.clone().unwrap_or_default(),
            uuid: self.uuid.clone().unwrap_or_default(),
        }
    }

    /// Query VBoxManage for the VM. Any query failure becomes
    /// [`Error::UnknownVm`]; output that lacks `name` or `UUID` is a
    /// [`Error::MissingIdentityField`].
    pub fn resolve<B: VBoxBackend + ?Sized>(self, backend: &B) -> Result<Vm<'_, B>> {
        let raw = backend
            .show_vm_info(self.identifier(), InfoQuery::default())
            .map_err(|e| {
                warn!(id = self.identifier(), error = %e, "showvminfo failed");
                self.unknown()
            })?;

        let info = parse_record(&raw, ParseMode::MachineReadable, true)?;
        // Identity comes from the text as printed, so names like `007` survive
        let verbatim = parse_record(&raw, ParseMode::MachineReadable, false)?;
        let identity = VmIdentity {
            name: identity_field(&verbatim, "name")?,
            uuid: identity_field(&verbatim, "UUID")?,
        };
        debug!(vm = %identity, keys = info.len(), "resolved VM");

        Ok(Vm {
            backend,
            identity,
            info,
            raw,
        })
    }
}

fn identity_field(info: &Record, field: &'static str) -> Result<String> {
    info.get(field)
        .map(Value::to_text)
        .ok_or(Error::MissingIdentityField { field })
}

/// A VM known to VirtualBox, along with its most recent `showvminfo` output
pub struct Vm<'a, B: VBoxBackend + ?Sized> {
    backend: &'a B,
    identity: VmIdentity,
    info: Record,
    raw: String,
}

impl<'a, B: VBoxBackend + ?Sized> Vm<'a, B> {
    /// Look a VM up by name and/or UUID
    pub fn resolve(backend: &'a B, name: Option<&str>, uuid: Option<&str>) -> Result<Self> {
        VmLookup::new(name, uuid)?.resolve(backend)
    }

    /// Create and register a new VM, then look it up by the UUID VBoxManage
    /// reports. `options.register` is forced on.
    pub fn create(backend: &'a B, options: &CreateVmOptions) -> Result<Self> {
        let options = CreateVmOptions {
            register: true,
            ..options.clone()
        };
        let report = backend.create_vm(&options)?;
        let created = parse_record(&report, ParseMode::Detailed, false)?;
        let uuid = identity_field(&created, "UUID")?;

        VmLookup::by_uuid(&uuid)?.resolve(backend)
    }

    pub fn identity(&self) -> &VmIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn uuid(&self) -> &str {
        &self.identity.uuid
    }

    /// Most recently parsed info
    pub fn info(&self) -> &Record {
        &self.info
    }

    /// Raw output `info` was parsed from
    pub fn raw_info(&self) -> &str {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.info.get(key)
    }

    /// Re-query the VM and replace the stored info.
    ///
    /// Returns the new info plus a [`RAW_TEXT_KEY`] entry holding the raw
    /// output, which replaces any VBoxManage key of the same name. A failed
    /// query is reported as [`Error::UnknownVm`].
    pub fn refresh(&mut self, details: bool, machine_readable: bool) -> Result<Record> {
        self.refresh_with(InfoQuery {
            details,
            machine_readable,
        })
    }

    pub fn refresh_with(&mut self, query: InfoQuery) -> Result<Record> {
        let raw = self
            .backend
            .show_vm_info(&self.identity.uuid, query)
            .map_err(|e| {
                warn!(vm = %self.identity, error = %e, "showvminfo failed");
                Error::UnknownVm {
                    name: self.identity.name.clone(),
                    uuid: self.identity.uuid.clone(),
                }
            })?;
        let info = parse_record(&raw, query.mode(), true)?;

        let mut with_raw = info.clone();
        with_raw.insert(RAW_TEXT_KEY, Value::Str(raw.clone()));

        debug!(vm = %self.identity, mode = %query.mode(), "refreshed VM info");
        self.info = info;
        self.raw = raw;
        Ok(with_raw)
    }

    /// Unregister the VM, optionally deleting its files
    pub fn unregister(self, delete: bool) -> Result<()> {
        self.backend.unregister_vm(&self.identity.uuid, delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListKind;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    const BOX1: &str = "name=\"box1\"\nUUID=\"1234-abcd\"\nmemory=512\nacpi=on\n";
    const BOX1_DETAILED: &str =
        "Name:            box1\nUUID:            1234-abcd\nMemory size:     1024MB\nDescription\nbuild host\nCPUs:            2\n";

    /// Backend answering `showvminfo` from canned output
    #[derive(Default)]
    struct MockBackend {
        /// (id, machine_readable) -> output
        responses: RefCell<HashMap<(String, bool), String>>,
        create_report: Option<String>,
        calls: RefCell<Vec<String>>,
    }

    impl MockBackend {
        fn with_vm(ids: &[&str], machine: &str) -> Self {
            let backend = Self::default();
            for id in ids {
                backend.respond(id, true, machine);
            }
            backend
        }

        fn respond(&self, id: &str, machine_readable: bool, output: &str) {
            self.responses
                .borrow_mut()
                .insert((id.to_string(), machine_readable), output.to_string());
        }

        fn forget(&self, id: &str) {
            self.responses.borrow_mut().retain(|(k, _), _| k != id);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl VBoxBackend for MockBackend {
        fn version(&self) -> Result<String> {
            Ok("7.0.14r161095".to_string())
        }

        fn list(&self, kind: ListKind, _long: bool) -> Result<String> {
            self.calls.borrow_mut().push(format!("list {}", kind));
            Ok(String::new())
        }

        fn show_vm_info(&self, id: &str, query: InfoQuery) -> Result<String> {
            self.calls.borrow_mut().push(format!(
                "showvminfo {} details={} machine={}",
                id, query.details, query.machine_readable
            ));
            self.responses
                .borrow()
                .get(&(id.to_string(), query.machine_readable))
                .cloned()
                .ok_or_else(|| Error::CommandFailed {
                    command: format!("VBoxManage showvminfo {}", id),
                    stderr: format!("Could not find a registered machine named '{}'", id),
                })
        }

        fn create_vm(&self, options: &CreateVmOptions) -> Result<String> {
            self.calls
                .borrow_mut()
                .push(format!("createvm {} register={}", options.name, options.register));
            self.create_report
                .clone()
                .ok_or_else(|| Error::Other("no create report".to_string()))
        }

        fn register_vm(&self, settings_file: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("registervm {}", settings_file.display()));
            Ok(())
        }

        fn unregister_vm(&self, uuid: &str, delete: bool) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("unregistervm {} delete={}", uuid, delete));
            Ok(())
        }
    }

    #[test]
    fn resolve_without_identifier_skips_query() {
        let backend = MockBackend::with_vm(&["box1"], BOX1);

        for (name, uuid) in [(None, None), (Some(""), Some("")), (Some(""), None)] {
            match Vm::resolve(&backend, name, uuid) {
                Err(Error::UnknownVm { name, uuid }) => {
                    assert_eq!(name, "");
                    assert_eq!(uuid, "");
                }
                Err(e) => panic!("expected UnknownVm, got {:?}", e),
                Ok(_) => panic!("expected UnknownVm, got a VM"),
            }
        }
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn resolve_by_name() {
        let backend = MockBackend::with_vm(&["box1"], BOX1);
        let vm = Vm::resolve(&backend, Some("box1"), None).unwrap();

        assert_eq!(
            vm.identity(),
            &VmIdentity {
                name: "box1".to_string(),
                uuid: "1234-abcd".to_string(),
            }
        );
        assert_eq!(vm.get("memory"), Some(&Value::Int(512)));
        assert_eq!(vm.get("acpi"), Some(&Value::Bool(true)));
        assert_eq!(vm.raw_info(), BOX1);
        assert_eq!(
            backend.calls(),
            ["showvminfo box1 details=false machine=true"]
        );
    }

    #[test]
    fn resolve_by_uuid() {
        let backend = MockBackend::with_vm(&["1234-abcd"], BOX1);
        let vm = Vm::resolve(&backend, None, Some("1234-abcd")).unwrap();
        assert_eq!(vm.name(), "box1");
        assert_eq!(vm.uuid(), "1234-abcd");
    }

    #[test]
    fn resolve_prefers_name() {
        let backend = MockBackend::with_vm(&["box1", "1234-abcd"], BOX1);
        Vm::resolve(&backend, Some("box1"), Some("1234-abcd")).unwrap();
        assert_eq!(
            backend.calls(),
            ["showvminfo box1 details=false machine=true"]
        );
    }

    #[test]
    fn resolve_unknown_vm() {
        let backend = MockBackend::default();
        match Vm::resolve(&backend, Some("doesnotexist"), None) {
            Err(Error::UnknownVm { name, uuid }) => {
                assert_eq!(name, "doesnotexist");
                assert_eq!(uuid, "");
            }
            Err(e) => panic!("expected UnknownVm, got {:?}", e),
            Ok(_) => panic!("expected UnknownVm, got a VM"),
        }
    }

    #[test]
    fn resolve_missing_uuid_field() {
        let backend = MockBackend::with_vm(&["box1"], "name=\"box1\"\nmemory=512\n");
        assert!(matches!(
            Vm::resolve(&backend, Some("box1"), None),
            Err(Error::MissingIdentityField { field: "UUID" })
        ));
    }

    #[test]
    fn resolve_malformed_output() {
        let backend = MockBackend::with_vm(&["box1"], "name=\"box1\"\ngarbage\n");
        assert!(matches!(
            Vm::resolve(&backend, Some("box1"), None),
            Err(Error::MalformedRecordLine { .. })
        ));
    }

    #[test]
    fn identity_survives_normalization() {
        let backend = MockBackend::with_vm(&["42"], "name=\"42\"\nUUID=\"5678\"\n");
        let vm = Vm::resolve(&backend, Some("42"), None).unwrap();
        assert_eq!(vm.name(), "42");
        assert_eq!(vm.get("name"), Some(&Value::Int(42)));
    }

    #[test]
    fn identity_keeps_leading_zeros() {
        let backend = MockBackend::with_vm(&["007"], "name=\"007\"\nUUID=\"0042\"\n");
        let vm = Vm::resolve(&backend, Some("007"), None).unwrap();
        assert_eq!(vm.name(), "007");
        assert_eq!(vm.uuid(), "0042");
        assert_eq!(vm.get("name"), Some(&Value::Int(7)));
    }

    #[test]
    fn refresh_injects_raw_text() {
        let backend = MockBackend::with_vm(&["box1", "1234-abcd"], BOX1);
        let mut vm = Vm::resolve(&backend, Some("box1"), None).unwrap();

        let updated = "name=\"box1\"\nUUID=\"1234-abcd\"\nmemory=2048\n";
        backend.respond("1234-abcd", true, updated);

        let record = vm.refresh(false, true).unwrap();
        assert_eq!(record.get(RAW_TEXT_KEY), Some(&Value::from(updated)));
        assert_eq!(record.get("memory"), Some(&Value::Int(2048)));

        // Stored info is replaced wholesale and keeps the raw text apart
        assert_eq!(vm.get("memory"), Some(&Value::Int(2048)));
        assert_eq!(vm.get("acpi"), None);
        assert!(!vm.info().contains_key(RAW_TEXT_KEY));
        assert_eq!(vm.raw_info(), updated);
        assert_eq!(
            backend.calls().last().map(String::as_str),
            Some("showvminfo 1234-abcd details=false machine=true")
        );
    }

    #[test]
    fn refresh_raw_text_wins_key_collision() {
        let raw = "name=\"box1\"\nUUID=\"1234-abcd\"\nstring=\"from vbox\"\n";
        let backend = MockBackend::with_vm(&["box1", "1234-abcd"], raw);
        let mut vm = Vm::resolve(&backend, Some("box1"), None).unwrap();

        let record = vm.refresh(false, true).unwrap();
        assert_eq!(record.get(RAW_TEXT_KEY), Some(&Value::from(raw)));
        assert_eq!(vm.get(RAW_TEXT_KEY), Some(&Value::from("from vbox")));
    }

    #[test]
    fn refresh_detailed() {
        let backend = MockBackend::with_vm(&["box1"], BOX1);
        backend.respond("1234-abcd", false, BOX1_DETAILED);
        let mut vm = Vm::resolve(&backend, Some("box1"), None).unwrap();

        let record = vm.refresh(true, false).unwrap();
        assert_eq!(record.get("Name"), Some(&Value::from("box1")));
        assert_eq!(record.get("Memory size"), Some(&Value::from("1024MB")));
        assert_eq!(record.get("Description"), Some(&Value::from("build host")));
        assert_eq!(record.get("CPUs"), Some(&Value::Int(2)));
        assert_eq!(
            backend.calls().last().map(String::as_str),
            Some("showvminfo 1234-abcd details=true machine=false")
        );
        // Identity is fixed at resolve time
        assert_eq!(vm.name(), "box1");
    }

    #[test]
    fn failed_refresh_keeps_previous_info() {
        let backend = MockBackend::with_vm(&["box1", "1234-abcd"], BOX1);
        let mut vm = Vm::resolve(&backend, Some("box1"), None).unwrap();

        backend.respond("1234-abcd", true, "name=\"box1\"\nbroken line\n");
        assert!(matches!(
            vm.refresh(false, true),
            Err(Error::MalformedRecordLine { .. })
        ));
        assert_eq!(vm.get("memory"), Some(&Value::Int(512)));
        assert_eq!(vm.raw_info(), BOX1);

        backend.forget("1234-abcd");
        match vm.refresh(false, true) {
            Err(Error::UnknownVm { name, uuid }) => {
                assert_eq!(name, "box1");
                assert_eq!(uuid, "1234-abcd");
            }
            other => panic!("expected UnknownVm, got {:?}", other),
        }
        assert_eq!(vm.raw_info(), BOX1);
    }

    #[test]
    fn create_registers_and_resolves() {
        let mut backend = MockBackend::with_vm(&["1234-abcd"], BOX1);
        backend.create_report = Some(
            "Virtual machine 'box1' is created and registered.\nUUID: 1234-abcd\nSettings file: '/vms/box1/box1.vbox'\n"
                .to_string(),
        );

        let vm = Vm::create(&backend, &CreateVmOptions::new("box1")).unwrap();
        assert_eq!(vm.uuid(), "1234-abcd");
        assert_eq!(
            backend.calls(),
            [
                "createvm box1 register=true",
                "showvminfo 1234-abcd details=false machine=true",
            ]
        );
    }

    #[test]
    fn create_without_uuid_in_report() {
        let mut backend = MockBackend::default();
        backend.create_report = Some("Virtual machine 'box1' is created.\n".to_string());
        assert!(matches!(
            Vm::create(&backend, &CreateVmOptions::new("box1")),
            Err(Error::MissingIdentityField { field: "UUID" })
        ));
    }

    #[test]
    fn unregister_by_uuid() {
        let backend = MockBackend::with_vm(&["box1"], BOX1);
        let vm = Vm::resolve(&backend, Some("box1"), None).unwrap();
        vm.unregister(true).unwrap();
        assert_eq!(
            backend.calls().last().map(String::as_str),
            Some("unregistervm 1234-abcd delete=true")
        );
    }

    #[test]
    fn lookup_identifier() {
        let lookup = VmLookup::new(Some("box1"), Some("1234")).unwrap();
        assert_eq!(lookup.identifier(), "box1");
        assert_eq!(VmLookup::by_uuid("1234").unwrap().identifier(), "1234");
        assert!(VmLookup::by_name("").is_err());
    }
}
