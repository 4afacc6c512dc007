//! Sample Asset Table
//!
//! One-shot effect clips are placed in KING RAM (KRAM) once at startup at fixed,
//! page-tagged word offsets and are never moved or freed afterwards. The ADPCM
//! driver only ever receives `(offset, length)` pairs resolved from this table.

use crate::cdda::CdBus;
use crate::{AudioError, KingBus, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// KRAM page 0 tag
pub const KRAM_PAGE0: u32 = 0x0000_0000;

/// KRAM page 1 tag (bit 31 of a KRAM address)
pub const KRAM_PAGE1: u32 = 0x8000_0000;

/// Encoded header bytes at the start of every clip that are not audio
pub const ADPCM_HEADER_BYTES: usize = 2048;

/// ADPCM start pointers are programmed in units of this many KRAM words
pub const KRAM_BLOCK_WORDS: u32 = 256;

/// 16-bit words per KRAM page
pub const KRAM_PAGE_WORDS: u32 = 0x4_0000;

/// Where the bytes of an asset come from at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleSource {
    /// Host file, relative paths resolve against the configuration directory
    File {
        /// File path
        path: String,
    },
    /// Raw sectors on the disc
    Disc {
        /// First logical block
        lba: u32,
        /// Clip size in bytes
        length: usize,
    },
}

/// Asset table entry as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Asset name, referenced by effect bindings
    pub name: String,
    /// Page-tagged KRAM word offset
    pub kram_offset: u32,
    /// Byte source
    pub source: SampleSource,
}

/// Immutable clip placed in KRAM
#[derive(Debug, Clone)]
pub struct SampleAsset {
    name: String,
    kram_offset: u32,
    data: Arc<[u8]>,
    header_bytes: usize,
}

impl SampleAsset {
    /// Create an asset with the standard encoded-header size
    pub fn new(name: impl Into<String>, kram_offset: u32, data: impl Into<Arc<[u8]>>) -> Self {
        SampleAsset {
            name: name.into(),
            kram_offset,
            data: data.into(),
            header_bytes: ADPCM_HEADER_BYTES,
        }
    }

    /// Asset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page-tagged KRAM word offset
    pub fn kram_offset(&self) -> u32 {
        self.kram_offset
    }

    /// Total byte length, header included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the clip carries no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Encoded header size in bytes
    pub fn header_bytes(&self) -> usize {
        self.header_bytes
    }

    /// Raw clip bytes
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    fn page(&self) -> u32 {
        self.kram_offset & KRAM_PAGE1
    }

    fn word_offset(&self) -> u32 {
        self.kram_offset & !KRAM_PAGE1
    }

    fn word_len(&self) -> u32 {
        self.data.len().div_ceil(2) as u32
    }
}

/// Validated set of assets, fixed for the process lifetime
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    assets: Vec<SampleAsset>,
}

impl AssetTable {
    /// Validate and build the table
    ///
    /// Rejects duplicate names, offsets that are not block aligned, clips no
    /// longer than their header, clips running past the end of their KRAM page
    /// and clips overlapping in KRAM.
    pub fn new(assets: Vec<SampleAsset>) -> Result<Self> {
        for (i, asset) in assets.iter().enumerate() {
            if asset.name.is_empty() {
                return Err(AudioError::Asset(format!("asset #{i} has no name")));
            }
            if assets[..i].iter().any(|a| a.name == asset.name) {
                return Err(AudioError::Asset(format!(
                    "duplicate asset name '{}'",
                    asset.name
                )));
            }
            if asset.word_offset() % KRAM_BLOCK_WORDS != 0 {
                return Err(AudioError::Asset(format!(
                    "'{}' offset 0x{:08X} is not aligned to {} words",
                    asset.name, asset.kram_offset, KRAM_BLOCK_WORDS
                )));
            }
            if asset.len() <= asset.header_bytes {
                return Err(AudioError::Asset(format!(
                    "'{}' is {} bytes, not longer than its {}-byte header",
                    asset.name,
                    asset.len(),
                    asset.header_bytes
                )));
            }
            if asset.word_offset() as u64 + asset.word_len() as u64 > KRAM_PAGE_WORDS as u64 {
                return Err(AudioError::Asset(format!(
                    "'{}' runs past the end of its KRAM page",
                    asset.name
                )));
            }
        }

        for (i, a) in assets.iter().enumerate() {
            for b in &assets[i + 1..] {
                if a.page() != b.page() {
                    continue;
                }
                let (a_start, b_start) = (a.word_offset(), b.word_offset());
                if a_start < b_start + b.word_len() && b_start < a_start + a.word_len() {
                    return Err(AudioError::Asset(format!(
                        "'{}' overlaps '{}' in KRAM",
                        a.name, b.name
                    )));
                }
            }
        }

        Ok(AssetTable { assets })
    }

    /// Resolve specs into bytes and validate the result
    ///
    /// File sources are read from the host, disc sources through `cd`.
    pub fn load<C: CdBus>(specs: &[AssetSpec], base_dir: &Path, cd: &mut C) -> Result<Self> {
        let mut assets = Vec::with_capacity(specs.len());
        for spec in specs {
            let data: Vec<u8> = match &spec.source {
                SampleSource::File { path } => std::fs::read(base_dir.join(path))?,
                SampleSource::Disc { lba, length } => {
                    let mut buf = vec![0u8; *length];
                    cd.read(*lba, &mut buf);
                    buf
                }
            };
            log::debug!(
                "loaded asset '{}' ({} bytes) for KRAM 0x{:08X}",
                spec.name,
                data.len(),
                spec.kram_offset
            );
            assets.push(SampleAsset::new(spec.name.clone(), spec.kram_offset, data));
        }
        Self::new(assets)
    }

    /// Look up an asset by name
    pub fn get(&self, name: &str) -> Option<&SampleAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Iterate over all assets
    pub fn iter(&self) -> impl Iterator<Item = &SampleAsset> {
        self.assets.iter()
    }

    /// Number of assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True when the table is empty
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Copy every clip into KRAM at its offset
    pub fn upload<K: KingBus>(&self, king: &mut K) {
        for asset in &self.assets {
            king.set_kram_write(asset.kram_offset, 1);
            king.kram_write(&asset.data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusEvent, RecordingBus};

    fn clip(len: usize) -> Vec<u8> {
        vec![0x55; len]
    }

    #[test]
    fn test_reference_layout_is_valid() {
        let table = AssetTable::new(vec![
            SampleAsset::new("click", KRAM_PAGE1, clip(6000)),
            SampleAsset::new("monster", KRAM_PAGE1 | 4096 * 3, clip(9000)),
            SampleAsset::new("shot", KRAM_PAGE1 | 4096 * 6, clip(9000)),
        ])
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("monster").unwrap().kram_offset(), 0x8000_3000);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = AssetTable::new(vec![
            SampleAsset::new("click", 0, clip(4096)),
            SampleAsset::new("click", 4096, clip(4096)),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_unaligned_offset() {
        let err = AssetTable::new(vec![SampleAsset::new("click", 100, clip(4096))]).unwrap_err();
        assert!(matches!(err, AudioError::Asset(_)));
    }

    #[test]
    fn test_rejects_header_only_clip() {
        let err = AssetTable::new(vec![SampleAsset::new("click", 0, clip(ADPCM_HEADER_BYTES))])
            .unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn test_rejects_overlap_on_same_page_only() {
        // 8192 bytes = 4096 words, so the second clip starts inside the first
        let overlapping = AssetTable::new(vec![
            SampleAsset::new("a", KRAM_PAGE1, clip(8192)),
            SampleAsset::new("b", KRAM_PAGE1 | 2048, clip(4096)),
        ]);
        assert!(overlapping.is_err());

        let other_page = AssetTable::new(vec![
            SampleAsset::new("a", KRAM_PAGE1, clip(8192)),
            SampleAsset::new("b", KRAM_PAGE0 | 2048, clip(4096)),
        ]);
        assert!(other_page.is_ok());
    }

    #[test]
    fn test_upload_writes_each_clip_at_its_offset() {
        let table = AssetTable::new(vec![
            SampleAsset::new("click", KRAM_PAGE1, clip(3000)),
            SampleAsset::new("shot", KRAM_PAGE1 | 4096 * 6, clip(5000)),
        ])
        .unwrap();
        let mut bus = RecordingBus::new();
        table.upload(&mut bus);

        assert_eq!(
            bus.events(),
            vec![
                BusEvent::KramWriteAddress { addr: KRAM_PAGE1, increment: 1 },
                BusEvent::KramWrite { len: 3000 },
                BusEvent::KramWriteAddress { addr: KRAM_PAGE1 | 4096 * 6, increment: 1 },
                BusEvent::KramWrite { len: 5000 },
            ]
        );
    }

    #[test]
    fn test_load_reads_disc_sources() {
        let mut bus = RecordingBus::new();
        let specs = vec![AssetSpec {
            name: "click".into(),
            kram_offset: KRAM_PAGE1,
            source: SampleSource::Disc { lba: 1200, length: 4096 },
        }];
        let table = AssetTable::load(&specs, Path::new("."), &mut bus).unwrap();
        assert_eq!(table.get("click").unwrap().len(), 4096);
        assert_eq!(bus.events(), vec![BusEvent::DiscRead { lba: 1200, len: 4096 }]);
    }
}
