//! vertigo: Drive VirtualBox from Rust
//!
//! This library wraps the `VBoxManage` command line behind a trait-based
//! backend and parses the key/value text it prints into typed [`Record`]s.
//! A [`Vm`] is resolved by name or UUID and keeps its latest parsed info.

pub mod backend;
pub mod error;
pub mod parser;
pub mod types;
pub mod vm;

pub use backend::VBoxBackend;
pub use error::{Error, Result};
pub use parser::{parse_record, parse_record_blocks, parse_vm_list};
pub use types::{
    CreateVmOptions, InfoQuery, ListKind, ListTarget, ParseMode, Record, Value, VmIdentity,
};
pub use vm::{Vm, VmLookup, RAW_TEXT_KEY};
