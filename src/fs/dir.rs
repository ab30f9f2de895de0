//! Directory parsing and the 8.3/long-name machinery.
//!
//! A directory is a cluster chain of 32-byte slots. Each logical entry is
//! one Short Directory Entry preceded on disk by its Long Directory Entry
//! run in reverse ordinal order; parsing front-pushes the run so it comes
//! out ordinal-ascending for name assembly.

use std::collections::VecDeque;

use crate::error::FatError;
use crate::fs::layout::{
    Geometry, LongEntry, ShortEntry, Timestamp, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_LONG_NAME,
    ATTR_LONG_NAME_MASK, ATTR_VOLUME_ID, DIR_ENTRY_SIZE, DIR_FREE_ENTRY, DIR_LAST_FREE_ENTRY,
    LAST_LONG_ENTRY, LONG_NAME_LENGTH, LONG_NAME_NULL, LONG_NAME_TRAIL, MAX_NAME_LENGTH,
    MAX_PATH_LENGTH, SHORT_NAME_LENGTH, SHORT_NAME_SPACE_PAD,
};

/// A logical directory entry: one SDE combined with its LDE run.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Display name, assembled from the LDE run or the 8.3 short name.
    pub name: String,
    /// Fully qualified path; entry identity for the open-file table.
    pub full_path: String,
    pub short: ShortEntry,
    /// LDE run in ordinal-ascending order. On disk the run is stored
    /// reversed, ordinal N first, immediately before the SDE.
    pub long_entries: VecDeque<LongEntry>,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.short.attributes & (ATTR_DIRECTORY | ATTR_VOLUME_ID) == 0
    }

    pub fn is_directory(&self) -> bool {
        self.short.attributes & (ATTR_DIRECTORY | ATTR_VOLUME_ID) == ATTR_DIRECTORY
    }

    pub fn is_volume_label(&self) -> bool {
        self.short.attributes & (ATTR_DIRECTORY | ATTR_VOLUME_ID) == ATTR_VOLUME_ID
    }

    pub fn first_cluster(&self) -> u32 {
        self.short.first_cluster()
    }

    /// Slots this entry occupies on disk.
    pub fn slot_count(&self) -> usize {
        1 + self.long_entries.len()
    }
}

/// Parse a directory's cluster-chain bytes into logical entries.
///
/// `chain` is the cluster chain the bytes were read from; it is needed to
/// derive the absolute byte offset of every slot so later updates can seek
/// straight back without re-scanning.
pub fn parse_directory(
    data: &[u8],
    chain: &[u32],
    geo: &Geometry,
    parent_path: &str,
) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut long_run: VecDeque<LongEntry> = VecDeque::new();
    let bpc = geo.bytes_per_cluster as usize;

    for slot in 0..data.len() / DIR_ENTRY_SIZE {
        let byte = slot * DIR_ENTRY_SIZE;
        let slot_bytes = &data[byte..byte + DIR_ENTRY_SIZE];

        match slot_bytes[0] {
            // Terminator: nothing after this slot is in use.
            DIR_LAST_FREE_ENTRY => break,
            // Freed slot: also breaks any long-name run in progress.
            DIR_FREE_ENTRY => {
                long_run.clear();
                continue;
            }
            _ => {}
        }

        let location = geo.cluster_offset(chain[byte / bpc]) + (byte % bpc) as u64;
        let attr = slot_bytes[11];

        if attr & ATTR_LONG_NAME_MASK == ATTR_LONG_NAME {
            long_run.push_front(LongEntry::parse(slot_bytes, location));
            continue;
        }

        let short = ShortEntry::parse(slot_bytes, location);
        let kind = attr & (ATTR_DIRECTORY | ATTR_VOLUME_ID);
        if kind != 0x00 && kind != ATTR_DIRECTORY && kind != ATTR_VOLUME_ID {
            // Invalid attribute combination; the run is still consumed.
            long_run.clear();
            continue;
        }

        let name = if long_run.is_empty() {
            short_name_to_string(&short.name)
        } else {
            assemble_long_name(&long_run)
        };
        let full_path = format!("{parent_path}{name}");
        entries.push(DirEntry {
            name,
            full_path,
            short,
            long_entries: std::mem::take(&mut long_run),
        });
    }

    entries
}

/// Concatenate the name units of an ordinal-ascending LDE run.
fn assemble_long_name(run: &VecDeque<LongEntry>) -> String {
    let mut name = String::new();
    for entry in run {
        for unit in entry.units() {
            if unit == LONG_NAME_NULL || unit == LONG_NAME_TRAIL {
                break;
            }
            name.push((unit & 0xFF) as u8 as char);
        }
    }
    name
}

/// Render an 11-byte short name with the implied dot.
///
/// Padding spaces are skipped; the first non-space byte after a padding
/// gap starts the extension.
pub fn short_name_to_string(name: &[u8; SHORT_NAME_LENGTH]) -> String {
    let mut out = String::new();
    let mut pad_seen = false;
    let mut dot_emitted = false;
    for &b in name {
        if b == SHORT_NAME_SPACE_PAD {
            pad_seen = true;
            continue;
        }
        if pad_seen && !dot_emitted {
            out.push('.');
            dot_emitted = true;
        }
        out.push(b as char);
    }
    out
}

/// The cyclic-shift hash binding an LDE run to its SDE.
pub fn checksum(short_name: &[u8; SHORT_NAME_LENGTH]) -> u8 {
    let mut sum = 0u8;
    for &b in short_name {
        sum = (if sum & 1 != 0 { 0x80u8 } else { 0 })
            .wrapping_add(sum >> 1)
            .wrapping_add(b);
    }
    sum
}

/// Validate a user-supplied name for creation and strip trailing dots.
pub fn validate_name(name: &str, current_path: &str) -> Result<String, FatError> {
    if name == "." || name == ".." {
        return Err(FatError::IllegalName(name.into()));
    }
    if name.contains('/') {
        return Err(FatError::SlashInName);
    }

    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(FatError::IllegalName(name.into()));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(FatError::NameTooLong(name.into()));
    }
    if current_path.len() + trimmed.len() > MAX_PATH_LENGTH {
        return Err(FatError::PathTooLong(name.into()));
    }
    for b in trimmed.bytes() {
        if b < 0x20 || matches!(b, b'"' | b'*' | b':' | b'<' | b'>' | b'?' | b'\\' | b'|') {
            return Err(FatError::IllegalName(name.into()));
        }
    }

    Ok(trimmed.to_string())
}

/// Derive the 11-byte padded basis name from a long name.
///
/// Returns the basis and whether the conversion was lossy (a character had
/// to be substituted).
pub fn generate_basis_name(name: &str) -> ([u8; SHORT_NAME_LENGTH], bool) {
    let mut lossy = false;
    let last_dot = name.rfind('.');

    // Substitute the characters that are legal in long names but not in
    // short ones, drop spaces, and drop every dot except the last.
    let mut cleaned = String::new();
    for (i, c) in name.char_indices() {
        match c {
            '+' | ',' | ';' | '=' | '[' | ']' => {
                cleaned.push('_');
                lossy = true;
            }
            ' ' => {}
            '.' => {
                if Some(i) == last_dot {
                    cleaned.push('.');
                }
            }
            _ => cleaned.push(c),
        }
    }
    let upper = cleaned.to_uppercase();

    let mut basis = [SHORT_NAME_SPACE_PAD; SHORT_NAME_LENGTH];
    let (primary, extension) = match upper.rfind('.') {
        Some(i) => (&upper[..i], Some(&upper[i + 1..])),
        None => (upper.as_str(), None),
    };
    for (i, b) in primary.bytes().take(8).enumerate() {
        basis[i] = b;
    }
    if let Some(ext) = extension {
        for (i, b) in ext.bytes().take(3).enumerate() {
            basis[8 + i] = b;
        }
    }

    (basis, lossy)
}

/// Whether a long name needs no numeric tail to be expressed in 8.3 form.
pub fn fits_short_name(name: &str) -> bool {
    let dots = name.matches('.').count();
    (dots == 0 && name.len() <= 11) || (dots == 1 && name.len() <= 12)
}

/// Resolve a short-name collision with a `~n` numeric tail.
///
/// The primary portion is trimmed so primary plus tail stay within eight
/// bytes; the extension is kept as-is.
pub fn generate_numeric_tail<F>(
    basis: [u8; SHORT_NAME_LENGTH],
    taken: F,
) -> Result<[u8; SHORT_NAME_LENGTH], FatError>
where
    F: Fn(&[u8; SHORT_NAME_LENGTH]) -> bool,
{
    let primary_len = basis[..8]
        .iter()
        .position(|&b| b == SHORT_NAME_SPACE_PAD)
        .unwrap_or(8);

    for n in 1..=999_999u32 {
        let tail = format!("~{n}");
        let keep = primary_len.min(8 - tail.len());
        let mut candidate = basis;
        candidate[..8].fill(SHORT_NAME_SPACE_PAD);
        candidate[..keep].copy_from_slice(&basis[..keep]);
        for (i, b) in tail.bytes().enumerate() {
            candidate[keep + i] = b;
        }
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(FatError::NoSpace)
}

/// Build the LDE run for a long name, ordinal-ascending.
///
/// Name characters are packed 13 to an entry; one NUL terminator follows
/// the last character if a unit remains, and the rest are trail-padded.
pub fn build_long_entries(name: &str, checksum: u8) -> VecDeque<LongEntry> {
    let source: Vec<u16> = name.bytes().map(u16::from).collect();
    let count = source.len().div_ceil(LONG_NAME_LENGTH);

    let mut run = VecDeque::new();
    for ordinal in 1..=count {
        let mut entry = LongEntry {
            ordinal: ordinal as u8,
            attributes: ATTR_LONG_NAME,
            entry_type: 0,
            checksum,
            first_cluster_lo: 0,
            ..Default::default()
        };
        if ordinal == count {
            entry.ordinal |= LAST_LONG_ENTRY;
        }

        let mut units = [LONG_NAME_TRAIL; LONG_NAME_LENGTH];
        let start = (ordinal - 1) * LONG_NAME_LENGTH;
        for (i, unit) in units.iter_mut().enumerate() {
            let index = start + i;
            if index < source.len() {
                *unit = source[index];
            } else if index == source.len() {
                *unit = LONG_NAME_NULL;
            }
        }
        entry.set_units(&units);
        run.push_back(entry);
    }

    run
}

/// Build a fresh logical entry for `create`/`mkdir`.
///
/// `taken` reports whether an 11-byte short name is already present in the
/// target directory.
pub fn new_entry<F>(
    name: &str,
    parent_path: &str,
    directory: bool,
    taken: F,
) -> Result<DirEntry, FatError>
where
    F: Fn(&[u8; SHORT_NAME_LENGTH]) -> bool,
{
    let (mut basis, lossy) = generate_basis_name(name);
    if lossy || !fits_short_name(name) || taken(&basis) {
        basis = generate_numeric_tail(basis, &taken)?;
    }

    let mut short = ShortEntry {
        name: basis,
        attributes: if directory { ATTR_DIRECTORY } else { ATTR_ARCHIVE },
        ..Default::default()
    };
    Timestamp::now().apply(&mut short);

    let long_entries = build_long_entries(name, checksum(&basis));

    Ok(DirEntry {
        name: name.to_string(),
        full_path: format!("{parent_path}{name}"),
        short,
        long_entries,
    })
}

/// Synthesize the `.` and `..` entries seeded into a new directory.
///
/// Date/time fields are copied from the directory's own entry; `..` points
/// at the parent, or 0 when the parent is the root.
pub fn dot_entries(
    self_cluster: u32,
    parent_cluster: u32,
    template: &ShortEntry,
) -> (ShortEntry, ShortEntry) {
    let mut dot = template.clone();
    dot.name = [SHORT_NAME_SPACE_PAD; SHORT_NAME_LENGTH];
    dot.name[0] = b'.';
    dot.attributes = ATTR_DIRECTORY;
    dot.nt_reserved = 0;
    dot.file_size = 0;
    dot.location = 0;
    dot.set_first_cluster(self_cluster);

    let mut dotdot = dot.clone();
    dotdot.name[1] = b'.';
    dotdot.set_first_cluster(parent_cluster);

    (dot, dotdot)
}
