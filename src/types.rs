//! Core types for vertigo

use crate::error::Error;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The two textual grammars VBoxManage prints VM info in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseMode {
    /// `--machinereadable`: one `key="value"` pair per line
    MachineReadable,
    /// Human-oriented `Key:   value` output, with multi-line values
    Detailed,
}

impl ParseMode {
    /// Separator between key and value
    pub fn separator(&self) -> char {
        match self {
            ParseMode::MachineReadable => '=',
            ParseMode::Detailed => ':',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::MachineReadable => "machine-readable",
            ParseMode::Detailed => "detailed",
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single value out of VBoxManage output.
///
/// Without normalization every value is a [`Value::Str`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Null,
    Str(String),
}

impl Value {
    /// Build a value from already-extracted text, normalizing it if asked.
    ///
    /// Normalization tries a base-10 integer first, then the `on`/`off`/`none`
    /// keywords, and otherwise keeps the string.
    pub fn from_text(text: &str, normalize: bool) -> Self {
        if !normalize {
            return Value::Str(text.to_string());
        }
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
        match text {
            "on" => Value::Bool(true),
            "off" => Value::Bool(false),
            "none" => Value::Null,
            _ => Value::Str(text.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value spelled the way VBoxManage prints it
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(true) => write!(f, "on"),
            Value::Bool(false) => write!(f, "off"),
            Value::Null => write!(f, "none"),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Parsed key/value output, in the order keys first appeared.
///
/// Re-inserting a key replaces its value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, current)) => Some(std::mem::replace(current, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// The identity of a registered VM
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VmIdentity {
    pub name: String,
    pub uuid: String,
}

impl fmt::Display for VmIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{}}}", self.name, self.uuid)
    }
}

/// A resource kind accepted by `VBoxManage list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Vms,
    RunningVms,
    OsTypes,
    HostDvds,
    HostFloppies,
    BridgedIfs,
    DhcpServers,
    HostInfo,
    HostCpuIds,
    HddBackends,
    Hdds,
    Dvds,
    Floppies,
    UsbHost,
    UsbFilters,
    SystemProperties,
    ExtPacks,
}

impl ListKind {
    /// Every kind, in the order `list all` walks them
    pub const ALL: [ListKind; 17] = [
        ListKind::Vms,
        ListKind::RunningVms,
        ListKind::OsTypes,
        ListKind::HostDvds,
        ListKind::HostFloppies,
        ListKind::BridgedIfs,
        ListKind::DhcpServers,
        ListKind::HostInfo,
        ListKind::HostCpuIds,
        ListKind::HddBackends,
        ListKind::Hdds,
        ListKind::Dvds,
        ListKind::Floppies,
        ListKind::UsbHost,
        ListKind::UsbFilters,
        ListKind::SystemProperties,
        ListKind::ExtPacks,
    ];

    /// The argument VBoxManage expects
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Vms => "vms",
            ListKind::RunningVms => "runningvms",
            ListKind::OsTypes => "ostypes",
            ListKind::HostDvds => "hostdvds",
            ListKind::HostFloppies => "hostfloppies",
            ListKind::BridgedIfs => "bridgedifs",
            ListKind::DhcpServers => "dhcpservers",
            ListKind::HostInfo => "hostinfo",
            ListKind::HostCpuIds => "hostcpuids",
            ListKind::HddBackends => "hddbackends",
            ListKind::Hdds => "hdds",
            ListKind::Dvds => "dvds",
            ListKind::Floppies => "floppies",
            ListKind::UsbHost => "usbhost",
            ListKind::UsbFilters => "usbfilters",
            ListKind::SystemProperties => "systemproperties",
            ListKind::ExtPacks => "extpacks",
        }
    }

    /// Whether the output is a `"name" {uuid}` VM list
    pub fn is_vm_list(&self) -> bool {
        matches!(self, ListKind::Vms | ListKind::RunningVms)
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ListKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownOption {
                command: "list".to_string(),
                option: s.to_string(),
            })
    }
}

/// What `list` should cover: one kind, or every kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    All,
    One(ListKind),
}

impl FromStr for ListTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(ListTarget::All)
        } else {
            s.parse().map(ListTarget::One)
        }
    }
}

/// Flags for a `showvminfo` query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoQuery {
    pub details: bool,
    pub machine_readable: bool,
}

impl InfoQuery {
    /// Grammar the output of this query is in
    pub fn mode(&self) -> ParseMode {
        if self.machine_readable {
            ParseMode::MachineReadable
        } else {
            ParseMode::Detailed
        }
    }
}

impl Default for InfoQuery {
    fn default() -> Self {
        Self {
            details: false,
            machine_readable: true,
        }
    }
}

/// Options for `VBoxManage createvm`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateVmOptions {
    pub name: String,
    pub ostype: Option<String>,
    pub register: bool,
    pub basefolder: Option<String>,
    pub uuid: Option<String>,
}

impl CreateVmOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
