//! On-disk layout of a FAT32 volume.
//!
//! Everything here is byte-exact: the BIOS Parameter Block, the FSInfo
//! sector, and the two 32-byte directory entry forms. Multi-byte integers
//! are little-endian on disk, so records are marshalled field-by-field
//! rather than transmuted.

use byteorder::{ByteOrder, LittleEndian};
use chrono::{Datelike, Local, Timelike};

use crate::error::FatError;

// Directory entry attributes.
pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;
pub const ATTR_LONG_NAME_MASK: u8 = 0x3F;

// Directory entry slot markers.
pub const DIR_ENTRY_SIZE: usize = 32;
pub const DIR_FREE_ENTRY: u8 = 0xE5;
pub const DIR_LAST_FREE_ENTRY: u8 = 0x00;
pub const SHORT_NAME_LENGTH: usize = 11;
pub const SHORT_NAME_SPACE_PAD: u8 = 0x20;
pub const LAST_LONG_ENTRY: u8 = 0x40;
pub const LONG_NAME_LENGTH: usize = 13;
pub const LONG_NAME_NULL: u16 = 0x0000;
pub const LONG_NAME_TRAIL: u16 = 0xFFFF;

// Allocation table entries.
pub const FAT_ENTRY_SIZE: u64 = 4;
pub const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;
pub const FREE_CLUSTER: u32 = 0x0000_0000;
pub const EOC: u32 = 0x0FFF_FFF8;

// Size limits.
pub const DIR_MAX_SIZE: u64 = 0x20_0000;
pub const FILE_MAX_SIZE: u64 = 0xFFFF_FFFF;
pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_PATH_LENGTH: usize = 260;

const FSINFO_LEAD_SIGNATURE: u32 = 0x41615252;
const FSINFO_STRUCT_SIGNATURE: u32 = 0x61417272;
const FSINFO_SIZE: usize = 512;

/// The BPB fields the engine uses, read once from sector 0.
#[derive(Debug, Clone)]
pub struct BiosParameterBlock {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sector_count: u16,
    pub num_fats: u8,
    pub total_sectors_32: u32,
    pub fat_size_32: u32,
    pub root_cluster: u32,
    pub fsinfo_sector: u16,
}

impl BiosParameterBlock {
    /// Parse and sanity-check the boot sector.
    pub fn parse(sector: &[u8]) -> Result<Self, FatError> {
        if sector.len() < 512 {
            return Err(FatError::Parse("boot sector is truncated".into()));
        }

        // Jump instruction is EB xx 90 or E9 xx xx on every real volume.
        if sector[0] != 0xEB && sector[0] != 0xE9 {
            return Err(FatError::Parse("bad jump instruction".into()));
        }

        let bytes_per_sector = LittleEndian::read_u16(&sector[11..13]);
        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            return Err(FatError::Parse(format!(
                "invalid bytes per sector: {bytes_per_sector}"
            )));
        }

        let sectors_per_cluster = sector[13];
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(FatError::Parse(format!(
                "invalid sectors per cluster: {sectors_per_cluster}"
            )));
        }

        let fat_size_16 = LittleEndian::read_u16(&sector[22..24]);
        let root_entry_count = LittleEndian::read_u16(&sector[17..19]);
        if fat_size_16 != 0 || root_entry_count != 0 {
            return Err(FatError::Parse("not a FAT32 volume".into()));
        }

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sector_count: LittleEndian::read_u16(&sector[14..16]),
            num_fats: sector[16],
            total_sectors_32: LittleEndian::read_u32(&sector[32..36]),
            fat_size_32: LittleEndian::read_u32(&sector[36..40]),
            root_cluster: LittleEndian::read_u32(&sector[44..48]),
            fsinfo_sector: LittleEndian::read_u16(&sector[48..50]),
        })
    }
}

/// Derived volume geometry; every byte-offset computation lives here.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,
    pub reserved_sector_count: u32,
    pub num_fats: u8,
    pub total_sectors: u32,
    pub fat_size: u32,
    pub first_data_sector: u32,
    pub count_of_clusters: u32,
    pub root_cluster: u32,
    pub fsinfo_sector: u16,
}

impl Geometry {
    pub fn from_bpb(bpb: &BiosParameterBlock) -> Self {
        let bytes_per_sector = bpb.bytes_per_sector as u32;
        let sectors_per_cluster = bpb.sectors_per_cluster as u32;
        let first_data_sector =
            bpb.reserved_sector_count as u32 + bpb.num_fats as u32 * bpb.fat_size_32;
        let count_of_clusters =
            bpb.total_sectors_32.saturating_sub(first_data_sector) / sectors_per_cluster;

        Self {
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster: bytes_per_sector * sectors_per_cluster,
            reserved_sector_count: bpb.reserved_sector_count as u32,
            num_fats: bpb.num_fats,
            total_sectors: bpb.total_sectors_32,
            fat_size: bpb.fat_size_32,
            first_data_sector,
            count_of_clusters,
            root_cluster: bpb.root_cluster,
            fsinfo_sector: bpb.fsinfo_sector,
        }
    }

    /// First sector of a data cluster. Valid only for n >= 2.
    pub fn first_sector_of_cluster(&self, n: u32) -> u64 {
        (n as u64 - 2) * self.sectors_per_cluster as u64 + self.first_data_sector as u64
    }

    /// Absolute byte offset of a data cluster.
    pub fn cluster_offset(&self, n: u32) -> u64 {
        self.first_sector_of_cluster(n) * self.bytes_per_sector as u64
    }

    /// Byte offset of FAT mirror `k`.
    pub fn fat_offset(&self, k: u8) -> u64 {
        (self.reserved_sector_count as u64 + k as u64 * self.fat_size as u64)
            * self.bytes_per_sector as u64
    }

    pub fn fsinfo_offset(&self) -> u64 {
        self.fsinfo_sector as u64 * self.bytes_per_sector as u64
    }

    pub fn entries_per_cluster(&self) -> u32 {
        self.bytes_per_cluster / DIR_ENTRY_SIZE as u32
    }
}

/// The FSInfo sector, held verbatim; only `free_count` is ever rewritten.
#[derive(Debug, Clone)]
pub struct FsInfoSector {
    raw: Vec<u8>,
}

impl FsInfoSector {
    pub fn parse(raw: Vec<u8>) -> Result<Self, FatError> {
        if raw.len() < FSINFO_SIZE {
            return Err(FatError::Parse("FSInfo sector is truncated".into()));
        }
        let lead = LittleEndian::read_u32(&raw[0..4]);
        let sig = LittleEndian::read_u32(&raw[484..488]);
        if lead != FSINFO_LEAD_SIGNATURE || sig != FSINFO_STRUCT_SIGNATURE {
            return Err(FatError::Parse(format!(
                "bad FSInfo signatures: {lead:#010X}/{sig:#010X}"
            )));
        }
        Ok(Self { raw })
    }

    pub fn free_count(&self) -> u32 {
        LittleEndian::read_u32(&self.raw[488..492])
    }

    pub fn set_free_count(&mut self, count: u32) {
        LittleEndian::write_u32(&mut self.raw[488..492], count);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// A Short Directory Entry plus the absolute byte offset of its slot.
///
/// `location` is derived, never stored on disk; it lets later updates
/// seek straight back to the slot without re-scanning the directory.
#[derive(Debug, Clone, Default)]
pub struct ShortEntry {
    pub name: [u8; SHORT_NAME_LENGTH],
    pub attributes: u8,
    pub nt_reserved: u8,
    pub created_time_tenth: u8,
    pub created_time: u16,
    pub created_date: u16,
    pub last_access_date: u16,
    pub first_cluster_hi: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster_lo: u16,
    pub file_size: u32,
    pub location: u64,
}

impl ShortEntry {
    pub fn parse(slot: &[u8], location: u64) -> Self {
        let mut name = [0u8; SHORT_NAME_LENGTH];
        name.copy_from_slice(&slot[0..11]);
        Self {
            name,
            attributes: slot[11],
            nt_reserved: slot[12],
            created_time_tenth: slot[13],
            created_time: LittleEndian::read_u16(&slot[14..16]),
            created_date: LittleEndian::read_u16(&slot[16..18]),
            last_access_date: LittleEndian::read_u16(&slot[18..20]),
            first_cluster_hi: LittleEndian::read_u16(&slot[20..22]),
            write_time: LittleEndian::read_u16(&slot[22..24]),
            write_date: LittleEndian::read_u16(&slot[24..26]),
            first_cluster_lo: LittleEndian::read_u16(&slot[26..28]),
            file_size: LittleEndian::read_u32(&slot[28..32]),
            location,
        }
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut slot = [0u8; DIR_ENTRY_SIZE];
        slot[0..11].copy_from_slice(&self.name);
        slot[11] = self.attributes;
        slot[12] = self.nt_reserved;
        slot[13] = self.created_time_tenth;
        LittleEndian::write_u16(&mut slot[14..16], self.created_time);
        LittleEndian::write_u16(&mut slot[16..18], self.created_date);
        LittleEndian::write_u16(&mut slot[18..20], self.last_access_date);
        LittleEndian::write_u16(&mut slot[20..22], self.first_cluster_hi);
        LittleEndian::write_u16(&mut slot[22..24], self.write_time);
        LittleEndian::write_u16(&mut slot[24..26], self.write_date);
        LittleEndian::write_u16(&mut slot[26..28], self.first_cluster_lo);
        LittleEndian::write_u32(&mut slot[28..32], self.file_size);
        slot
    }

    pub fn first_cluster(&self) -> u32 {
        (self.first_cluster_hi as u32) << 16 | self.first_cluster_lo as u32
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.first_cluster_hi = (cluster >> 16) as u16;
        self.first_cluster_lo = (cluster & 0xFFFF) as u16;
    }
}

/// A Long Directory Entry plus the absolute byte offset of its slot.
#[derive(Debug, Clone, Default)]
pub struct LongEntry {
    pub ordinal: u8,
    pub name1: [u16; 5],
    pub attributes: u8,
    pub entry_type: u8,
    pub checksum: u8,
    pub name2: [u16; 6],
    pub first_cluster_lo: u16,
    pub name3: [u16; 2],
    pub location: u64,
}

impl LongEntry {
    pub fn parse(slot: &[u8], location: u64) -> Self {
        let mut name1 = [0u16; 5];
        LittleEndian::read_u16_into(&slot[1..11], &mut name1);
        let mut name2 = [0u16; 6];
        LittleEndian::read_u16_into(&slot[14..26], &mut name2);
        let mut name3 = [0u16; 2];
        LittleEndian::read_u16_into(&slot[28..32], &mut name3);
        Self {
            ordinal: slot[0],
            name1,
            attributes: slot[11],
            entry_type: slot[12],
            checksum: slot[13],
            name2,
            first_cluster_lo: LittleEndian::read_u16(&slot[26..28]),
            name3,
            location,
        }
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut slot = [0u8; DIR_ENTRY_SIZE];
        slot[0] = self.ordinal;
        LittleEndian::write_u16_into(&self.name1, &mut slot[1..11]);
        slot[11] = self.attributes;
        slot[12] = self.entry_type;
        slot[13] = self.checksum;
        LittleEndian::write_u16_into(&self.name2, &mut slot[14..26]);
        LittleEndian::write_u16(&mut slot[26..28], self.first_cluster_lo);
        LittleEndian::write_u16_into(&self.name3, &mut slot[28..32]);
        slot
    }

    /// The 13 UCS-2 units of this entry, in name order.
    pub fn units(&self) -> [u16; LONG_NAME_LENGTH] {
        let mut units = [0u16; LONG_NAME_LENGTH];
        units[0..5].copy_from_slice(&self.name1);
        units[5..11].copy_from_slice(&self.name2);
        units[11..13].copy_from_slice(&self.name3);
        units
    }

    /// Store the 13 units back into the three name fields.
    pub fn set_units(&mut self, units: &[u16; LONG_NAME_LENGTH]) {
        self.name1.copy_from_slice(&units[0..5]);
        self.name2.copy_from_slice(&units[5..11]);
        self.name3.copy_from_slice(&units[11..13]);
    }
}

/// Creation/write timestamp fields in the on-disk encoding.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    pub tenth: u8,
    pub time: u16,
    pub date: u16,
}

impl Timestamp {
    /// Encode the local wall clock.
    pub fn now() -> Self {
        let now = Local::now();
        let tenth = ((now.timestamp_subsec_millis() % 1000) / 5) as u8;
        let time = (now.second() as u16 / 2)
            | ((now.minute() as u16) << 5)
            | ((now.hour() as u16) << 11);
        let year = (now.year().max(1980) - 1980) as u16;
        let date = now.day() as u16 | ((now.month() as u16) << 5) | (year << 9);
        Self { tenth, time, date }
    }

    /// Stamp all date/time fields of a fresh entry.
    pub fn apply(&self, entry: &mut ShortEntry) {
        entry.created_time_tenth = self.tenth;
        entry.created_time = self.time;
        entry.created_date = self.date;
        entry.last_access_date = self.date;
        entry.write_time = self.time;
        entry.write_date = self.date;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_boot_sector() -> Vec<u8> {
        let mut bpb = vec![0u8; 512];
        bpb[0] = 0xEB;
        bpb[1] = 0x58;
        bpb[2] = 0x90;
        LittleEndian::write_u16(&mut bpb[11..13], 512);
        bpb[13] = 8;
        LittleEndian::write_u16(&mut bpb[14..16], 32);
        bpb[16] = 2;
        LittleEndian::write_u32(&mut bpb[32..36], 131072);
        LittleEndian::write_u32(&mut bpb[36..40], 1024);
        LittleEndian::write_u32(&mut bpb[44..48], 2);
        LittleEndian::write_u16(&mut bpb[48..50], 1);
        bpb
    }

    #[test]
    fn bpb_parse_and_geometry() {
        let bpb = BiosParameterBlock::parse(&minimal_boot_sector()).unwrap();
        assert_eq!(bpb.bytes_per_sector, 512);
        assert_eq!(bpb.sectors_per_cluster, 8);

        let geo = Geometry::from_bpb(&bpb);
        assert_eq!(geo.bytes_per_cluster, 4096);
        assert_eq!(geo.first_data_sector, 32 + 2 * 1024);
        assert_eq!(geo.count_of_clusters, (131072 - 2080) / 8);
        assert_eq!(geo.first_sector_of_cluster(2), 2080);
        assert_eq!(geo.fat_offset(0), 32 * 512);
        assert_eq!(geo.fat_offset(1), (32 + 1024) * 512);
    }

    #[test]
    fn bpb_rejects_non_fat32() {
        let mut sector = minimal_boot_sector();
        // A 16-bit FAT size marks FAT12/16 format.
        LittleEndian::write_u16(&mut sector[22..24], 9);
        assert!(BiosParameterBlock::parse(&sector).is_err());
    }

    #[test]
    fn short_entry_round_trip() {
        let mut entry = ShortEntry {
            attributes: ATTR_ARCHIVE,
            created_time_tenth: 77,
            created_time: 0x1234,
            created_date: 0x5678,
            last_access_date: 0x5678,
            write_time: 0x1234,
            write_date: 0x5678,
            file_size: 42,
            location: 0xDEAD,
            ..Default::default()
        };
        entry.name.copy_from_slice(b"HELLO   TXT");
        entry.set_first_cluster(0x0005_0003);

        let parsed = ShortEntry::parse(&entry.to_bytes(), 0xDEAD);
        assert_eq!(parsed.name, entry.name);
        assert_eq!(parsed.first_cluster(), 0x0005_0003);
        assert_eq!(parsed.file_size, 42);
        assert_eq!(parsed.write_date, 0x5678);
    }

    #[test]
    fn long_entry_round_trip() {
        let mut entry = LongEntry {
            ordinal: 1 | LAST_LONG_ENTRY,
            attributes: ATTR_LONG_NAME,
            checksum: 0xA5,
            ..Default::default()
        };
        let mut units = [LONG_NAME_TRAIL; LONG_NAME_LENGTH];
        for (i, b) in b"hello.txt".iter().enumerate() {
            units[i] = *b as u16;
        }
        units[9] = LONG_NAME_NULL;
        entry.set_units(&units);

        let parsed = LongEntry::parse(&entry.to_bytes(), 7);
        assert_eq!(parsed.ordinal, 0x41);
        assert_eq!(parsed.units(), units);
        assert_eq!(parsed.checksum, 0xA5);
        assert_eq!(parsed.location, 7);
    }

    #[test]
    fn timestamp_encoding() {
        // 2026-08-02 14:30:08 -> day 2, month 8, year 46; 8/2 | 30<<5 | 14<<11
        let date = 2u16 | (8 << 5) | (46 << 9);
        let time = 4u16 | (30 << 5) | (14 << 11);
        assert_eq!(date & 0x1F, 2);
        assert_eq!((date >> 5) & 0x0F, 8);
        assert_eq!((date >> 9) + 1980, 2026);
        assert_eq!((time & 0x1F) * 2, 8);
        assert_eq!((time >> 5) & 0x3F, 30);
        assert_eq!(time >> 11, 14);

        let ts = Timestamp::now();
        assert!(ts.tenth < 200);
    }
}
