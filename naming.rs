//! Mapping between logical note names and physical identifiers.
//!
//! A logical name is whatever the user typed. A physical identifier is the
//! key (key-value backend) or file name (directory backend) the note is
//! stored under. The encryption flag is carried only by the identifier.
//!
//! ## Directory naming
//!
//! ```text
//! <escaped name>.edna.txt         plain note
//! <escaped name>.encr.edna.txt    encrypted note
//! ```
//!
//! Characters that are illegal or unsafe in file names are written as
//! `%XX` with upper-case hex digits. Decoding only accepts identifiers that
//! re-encode to exactly the same string, so hand-placed or mangled files are
//! rejected instead of being surfaced as notes.
//!
//! ## Key-value naming
//!
//! ```text
//! note:<name>         plain note
//! note.encr:<name>    encrypted note
//! ```

use crate::backend::BackendKind;
use crate::error::{Result, VaultError};

/// Suffix of plain note files
pub const NOTE_EXT: &str = ".edna.txt";
/// Suffix of encrypted note files
pub const ENCRYPTED_NOTE_EXT: &str = ".encr.edna.txt";

/// Key prefix of plain notes in the key-value store
pub const KV_PREFIX: &str = "note:";
/// Key prefix of encrypted notes in the key-value store
pub const KV_ENCRYPTED_PREFIX: &str = "note.encr:";

const ENCR_MARKER: &str = ".encr";

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// A decoded physical identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalName {
    pub name: String,
    pub encrypted: bool,
}

/// Build the physical identifier for `name` on a backend of the given kind.
pub fn to_physical_name(kind: BackendKind, name: &str, encrypted: bool) -> String {
    match kind {
        BackendKind::KeyValue => {
            let prefix = if encrypted { KV_ENCRYPTED_PREFIX } else { KV_PREFIX };
            format!("{}{}", prefix, name)
        }
        BackendKind::Directory => {
            let ext = if encrypted { ENCRYPTED_NOTE_EXT } else { NOTE_EXT };
            format!("{}{}", escape_file_stem(name), ext)
        }
    }
}

/// Decode a physical identifier back into a logical name.
///
/// Fails with [`VaultError::InvalidName`] when the identifier does not follow
/// the naming convention, does not round-trip, or decodes to an empty name.
pub fn from_physical_name(kind: BackendKind, id: &str) -> Result<PhysicalName> {
    let decoded = match kind {
        BackendKind::KeyValue => {
            if let Some(name) = id.strip_prefix(KV_ENCRYPTED_PREFIX) {
                PhysicalName { name: name.to_string(), encrypted: true }
            } else if let Some(name) = id.strip_prefix(KV_PREFIX) {
                PhysicalName { name: name.to_string(), encrypted: false }
            } else {
                return Err(VaultError::invalid_name(id));
            }
        }
        BackendKind::Directory => {
            let (stem, encrypted) = split_note_file_name(id)
                .ok_or_else(|| VaultError::invalid_name(id))?;
            let name = unescape_file_stem(stem).ok_or_else(|| VaultError::invalid_name(id))?;
            PhysicalName { name, encrypted }
        }
    };

    if decoded.name.is_empty() {
        return Err(VaultError::invalid_name(id));
    }
    if to_physical_name(kind, &decoded.name, decoded.encrypted) != id {
        return Err(VaultError::invalid_name(id));
    }
    Ok(decoded)
}

/// True if the file name carries one of the note suffixes.
pub fn is_note_file(file_name: &str) -> bool {
    file_name.ends_with(NOTE_EXT)
}

/// True if the key carries one of the note prefixes.
pub fn is_note_key(key: &str) -> bool {
    key.starts_with(KV_PREFIX) || key.starts_with(KV_ENCRYPTED_PREFIX)
}

/// True if the identifier denotes an encrypted note.
pub fn is_encrypted_id(kind: BackendKind, id: &str) -> bool {
    match kind {
        BackendKind::KeyValue => id.starts_with(KV_ENCRYPTED_PREFIX),
        BackendKind::Directory => id.ends_with(ENCRYPTED_NOTE_EXT),
    }
}

/// Canonical file name for a note file whose stem was not escaped.
///
/// Files written before escaping existed, or renamed by hand, keep the raw
/// logical name as their stem. Returns `None` when the file is already
/// canonical or cannot be repaired.
pub fn canonical_file_name(file_name: &str) -> Option<String> {
    if from_physical_name(BackendKind::Directory, file_name).is_ok() {
        return None;
    }
    let (stem, encrypted) = split_note_file_name(file_name)?;
    if stem.is_empty() {
        return None;
    }
    let fixed = to_physical_name(BackendKind::Directory, stem, encrypted);
    if fixed == file_name {
        None
    } else {
        Some(fixed)
    }
}

fn split_note_file_name(file_name: &str) -> Option<(&str, bool)> {
    if let Some(stem) = file_name.strip_suffix(ENCRYPTED_NOTE_EXT) {
        Some((stem, true))
    } else {
        file_name.strip_suffix(NOTE_EXT).map(|stem| (stem, false))
    }
}

fn needs_escape(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '%') || c.is_ascii_control()
}

fn escaped(byte: u8) -> String {
    format!("%{:02X}", byte)
}

/// Escape a logical name into a file-name-safe stem.
pub fn escape_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if needs_escape(c) {
            out.push_str(&escaped(c as u8));
        } else {
            out.push(c);
        }
    }

    // a plain stem ending in ".encr" would read back as an encrypted note
    if out.ends_with(ENCR_MARKER) {
        let at = out.len() - ENCR_MARKER.len();
        out.replace_range(at..at + 1, &escaped(b'.'));
    }

    let base = out.split('.').next().unwrap_or_default();
    if RESERVED_DEVICE_NAMES
        .iter()
        .any(|reserved| base.eq_ignore_ascii_case(reserved))
    {
        let first = out.as_bytes()[0];
        out.replace_range(0..1, &escaped(first));
    }
    out
}

/// Reverse of [`escape_file_stem`]. Returns `None` on malformed escapes.
///
/// This does not check canonical form; [`from_physical_name`] does that by
/// re-encoding.
pub fn unescape_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            if !byte.is_ascii() {
                return None;
            }
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
