pub mod fetch;
pub mod header_file;

use std::path::{Path, PathBuf};

use chainlab_core::{
    codec::{check_hash_hex, check_u32},
    BlockHeader, FormatError,
};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use header_file::HeaderFile;

/// One entry of `blocks.json`. Every field is optional on the wire so that a
/// missing value is reported against its item rather than as a JSON error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub prev_block: Option<String>,
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits_hex: Option<String>,
    #[serde(default)]
    pub bits: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("bits_hex `{0}` is not a hex number")]
    BitsHex(String),
    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Debug, Error)]
pub enum HeaderSourceError {
    #[error("header file {0} not found; pass --headers with the right path or run `chainlab fetch`")]
    NotFound(PathBuf),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not a JSON list of headers")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{0} contains no headers")]
    Empty(PathBuf),
    #[error("item {index}: {source}")]
    Invalid { index: usize, source: RecordError },
}

impl HeaderRecord {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.label.clone())
            .unwrap_or_else(|| match self.height {
                Some(h) => format!("Block #{h}"),
                None => "Block #?".to_string(),
            })
    }

    /// True when every field needed to build a header is present.
    pub fn is_complete(&self) -> bool {
        self.version.is_some()
            && self.prev_block.is_some()
            && self.merkle_root.is_some()
            && self.timestamp.is_some()
            && (self.bits.is_some() || self.bits_hex.is_some())
    }

    pub fn to_header(&self) -> Result<BlockHeader, RecordError> {
        let prev_block = self
            .prev_block
            .as_deref()
            .ok_or(RecordError::Missing("prev_block"))?
            .to_ascii_lowercase();
        let merkle_root = self
            .merkle_root
            .as_deref()
            .ok_or(RecordError::Missing("merkle_root"))?
            .to_ascii_lowercase();
        check_hash_hex("prev_block", &prev_block)?;
        check_hash_hex("merkle_root", &merkle_root)?;

        let bits = match (self.bits, self.bits_hex.as_deref()) {
            (Some(bits), _) => i128::from(bits),
            (None, Some(hex)) => i64::from_str_radix(hex.trim_start_matches("0x"), 16)
                .map(i128::from)
                .map_err(|_| RecordError::BitsHex(hex.to_string()))?,
            (None, None) => return Err(RecordError::Missing("bits")),
        };
        let version = self.version.ok_or(RecordError::Missing("version"))?;
        let timestamp = self.timestamp.ok_or(RecordError::Missing("timestamp"))?;

        Ok(BlockHeader {
            name: self.display_name(),
            height: self.height.and_then(|h| u64::try_from(h).ok()),
            version: check_u32("version", version.into())?,
            prev_block,
            merkle_root,
            timestamp: check_u32("timestamp", timestamp.into())?,
            bits: check_u32("bits", bits)?,
        })
    }
}

/// Validate every record; the first bad one fails the whole set.
pub fn headers_from_records(
    records: &[HeaderRecord],
) -> Result<Vec<BlockHeader>, HeaderSourceError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .to_header()
                .map_err(|source| HeaderSourceError::Invalid { index, source })
        })
        .collect()
}

pub fn load_headers(path: impl AsRef<Path>) -> Result<Vec<BlockHeader>, HeaderSourceError> {
    HeaderFile::new(path.as_ref()).load_headers()
}

pub fn choose_header<'a, R: Rng + ?Sized>(
    headers: &'a [BlockHeader],
    rng: &mut R,
) -> Option<&'a BlockHeader> {
    headers.choose(rng)
}

/// Load the header file and pick one header uniformly at random.
pub fn load_random_header<R: Rng + ?Sized>(
    path: impl AsRef<Path>,
    rng: &mut R,
) -> Result<BlockHeader, HeaderSourceError> {
    let path = path.as_ref();
    let headers = load_headers(path)?;
    choose_header(&headers, rng)
        .cloned()
        .ok_or_else(|| HeaderSourceError::Empty(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_record() -> HeaderRecord {
        HeaderRecord {
            label: Some("Block #0".into()),
            height: Some(0),
            version: Some(1),
            prev_block: Some("0".repeat(64)),
            merkle_root: Some(
                "4A5E1E4BAAB89F3A32518A88C31BC87F618F76673E2CC77AB2127B7AFDEDA33B".into(),
            ),
            timestamp: Some(1_231_006_505),
            bits: Some(486_604_799),
            ..Default::default()
        }
    }

    #[test]
    fn valid_record_converts_and_lowercases_hashes() {
        let header = genesis_record().to_header().unwrap();
        assert_eq!(header.name, "Block #0");
        assert_eq!(header.height, Some(0));
        assert_eq!(header.bits, 0x1d00ffff);
        assert_eq!(
            header.merkle_root,
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
    }

    #[test]
    fn bits_hex_is_used_when_bits_is_absent() {
        let record = HeaderRecord {
            bits: None,
            bits_hex: Some("1d00ffff".into()),
            ..genesis_record()
        };
        assert_eq!(record.to_header().unwrap().bits, 0x1d00ffff);

        let record = HeaderRecord {
            bits: None,
            bits_hex: Some("nothex".into()),
            ..genesis_record()
        };
        assert_eq!(
            record.to_header(),
            Err(RecordError::BitsHex("nothex".into()))
        );
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let record = HeaderRecord {
            timestamp: Some(-5),
            ..genesis_record()
        };
        assert!(matches!(
            record.to_header(),
            Err(RecordError::Format(FormatError::OutOfRange {
                field: "timestamp",
                ..
            }))
        ));

        let record = HeaderRecord {
            version: Some(u32::MAX as i64 + 1),
            ..genesis_record()
        };
        assert!(record.to_header().is_err());
    }

    #[test]
    fn bad_hashes_and_missing_fields_are_rejected() {
        let record = HeaderRecord {
            prev_block: Some("abc".into()),
            ..genesis_record()
        };
        assert!(matches!(
            record.to_header(),
            Err(RecordError::Format(FormatError::HexLength { field: "prev_block", .. }))
        ));

        let record = HeaderRecord {
            merkle_root: None,
            ..genesis_record()
        };
        assert_eq!(record.to_header(), Err(RecordError::Missing("merkle_root")));
        assert!(!record.is_complete());
    }

    #[test]
    fn display_name_prefers_name_then_label_then_height() {
        let mut record = genesis_record();
        record.name = Some("Genesis".into());
        assert_eq!(record.display_name(), "Genesis");
        record.name = None;
        assert_eq!(record.display_name(), "Block #0");
        record.label = None;
        record.height = Some(7);
        assert_eq!(record.display_name(), "Block #7");
        record.height = None;
        assert_eq!(record.display_name(), "Block #?");
    }

    #[test]
    fn negative_height_means_unknown() {
        let record = HeaderRecord {
            height: Some(-1),
            ..genesis_record()
        };
        assert_eq!(record.to_header().unwrap().height, None);
    }

    #[test]
    fn headers_from_records_reports_the_failing_index() {
        let records = vec![
            genesis_record(),
            HeaderRecord {
                version: None,
                ..genesis_record()
            },
        ];
        match headers_from_records(&records) {
            Err(HeaderSourceError::Invalid { index, source }) => {
                assert_eq!(index, 1);
                assert_eq!(source, RecordError::Missing("version"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
