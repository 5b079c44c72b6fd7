//! Run-to-run stable digests of territory state.
//!
//! Process-seeded hashers (`DefaultHasher`, ahash) differ between runs, so
//! digests are folded with FNV-1a over little-endian field bytes instead.

use crate::cell::Cell;
use crate::grid::ClaimRecord;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Incremental FNV-1a digest fed with territory fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerritoryDigest(u64);

impl Default for TerritoryDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl TerritoryDigest {
    pub fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn fold(&mut self, bytes: &[u8]) {
        self.0 = bytes
            .iter()
            .fold(self.0, |acc, &byte| (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
    }

    pub fn push_u32(&mut self, value: u32) {
        self.fold(&value.to_le_bytes());
    }

    pub fn push_u64(&mut self, value: u64) {
        self.fold(&value.to_le_bytes());
    }

    pub fn push_cell(&mut self, cell: Cell) {
        self.push_u32(cell.world.0);
        self.fold(&cell.x.to_le_bytes());
        self.fold(&cell.z.to_le_bytes());
    }

    pub fn push_record(&mut self, record: &ClaimRecord) {
        self.push_cell(record.cell());
        self.push_u32(record.group.0);
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

/// Digest of an ordered claim list. Records must already be sorted.
pub fn claims_digest<'a>(records: impl IntoIterator<Item = &'a ClaimRecord>) -> u64 {
    records
        .into_iter()
        .fold(TerritoryDigest::new(), |mut digest, record| {
            digest.push_record(record);
            digest
        })
        .finish()
}
