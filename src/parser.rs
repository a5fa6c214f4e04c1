//! Parsers for VBoxManage text output

use crate::error::{Error, Result};
use crate::types::{ParseMode, Record, Value, VmIdentity};

/// Parse a key/value dump (as printed by `showvminfo`) into a [`Record`].
///
/// In [`ParseMode::MachineReadable`] every non-blank line must be `key=value`;
/// the value loses surrounding whitespace and one layer of double quotes.
///
/// In [`ParseMode::Detailed`] a line without `:` opens a multi-line entry:
/// the line itself is the key and the following separator-less lines are its
/// value, joined with `\n`. The entry is stored when the next `key: value`
/// line (or the end of input) closes it. Values keep any further `:`.
pub fn parse_record(raw: &str, mode: ParseMode, normalize: bool) -> Result<Record> {
    match mode {
        ParseMode::MachineReadable => parse_machine_readable(raw, normalize),
        ParseMode::Detailed => Ok(parse_detailed(raw, normalize)),
    }
}

fn parse_machine_readable(raw: &str, normalize: bool) -> Result<Record> {
    let mut record = Record::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let sep = ParseMode::MachineReadable.separator();
        let (key, value) = line.split_once(sep).ok_or_else(|| Error::MalformedRecordLine {
            line: line.to_string(),
            mode: ParseMode::MachineReadable,
        })?;

        record.insert(key.trim(), Value::from_text(unquote(value), normalize));
    }

    Ok(record)
}

fn parse_detailed(raw: &str, normalize: bool) -> Record {
    let sep = ParseMode::Detailed.separator();
    let mut record = Record::new();
    let mut long_entry: Option<(String, Vec<&str>)> = None;

    for line in raw.lines() {
        let Some((key, value)) = line.split_once(sep) else {
            match long_entry.as_mut() {
                Some((_, lines)) => lines.push(line),
                None => {
                    let key = line.trim();
                    // Blank lines between sections never start an entry
                    if !key.is_empty() {
                        long_entry = Some((key.to_string(), Vec::new()));
                    }
                }
            }
            continue;
        };

        if let Some((long_key, lines)) = long_entry.take() {
            record.insert(long_key, Value::from_text(lines.join("\n").trim(), normalize));
        }
        record.insert(key.trim(), Value::from_text(value.trim(), normalize));
    }

    if let Some((long_key, lines)) = long_entry {
        record.insert(long_key, Value::from_text(lines.join("\n").trim(), normalize));
    }

    record
}

/// Strip surrounding spaces and at most one layer of double quotes
fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .trim()
}

/// Parse output made of blank-line separated blocks (`list ostypes`,
/// `list --long hdds`, ...) into one record per block
pub fn parse_record_blocks(raw: &str, mode: ParseMode, normalize: bool) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut block = String::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                records.push(parse_record(&block, mode, normalize)?);
                block.clear();
            }
            continue;
        }
        block.push_str(line);
        block.push('\n');
    }

    if !block.is_empty() {
        records.push(parse_record(&block, mode, normalize)?);
    }

    Ok(records)
}

/// Parse `list vms` / `list runningvms` output (`"name" {uuid}` per line)
pub fn parse_vm_list(raw: &str) -> Result<Vec<VmIdentity>> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_vm_list_line)
        .collect()
}

fn parse_vm_list_line(line: &str) -> Result<VmIdentity> {
    let malformed = || Error::MalformedListLine {
        line: line.to_string(),
    };

    let trimmed = line.trim();
    let (name_part, uuid_part) = trimmed.rsplit_once(' ').ok_or_else(malformed)?;

    let uuid = uuid_part
        .strip_prefix('{')
        .and_then(|u| u.strip_suffix('}'))
        .ok_or_else(malformed)?;
    let name = name_part
        .trim()
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .ok_or_else(malformed)?;

    Ok(VmIdentity {
        name: name.to_string(),
        uuid: uuid.to_string(),
    })
}
