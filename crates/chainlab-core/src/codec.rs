use crate::{
    constants::{BLOCK_FIELD_DELIMITER, HASH_HEX_SIZE, HASH_SIZE, HEADER_SIZE, NONCE_OFFSET},
    error::FormatError,
    Block, BlockHeader,
};

/// Serialize `index|prev_hash|timestamp|data|nonce` as UTF-8. `|` inside
/// `data` is not escaped.
pub fn block_bytes(block: &Block) -> Vec<u8> {
    let d = BLOCK_FIELD_DELIMITER;
    format!(
        "{}{d}{}{d}{}{d}{}{d}{}",
        block.index, block.prev_hash, block.timestamp, block.data, block.nonce
    )
    .into_bytes()
}

/// Serialize a header with the given nonce into its 80-byte little-endian
/// Bitcoin wire form.
pub fn header_bytes(header: &BlockHeader, nonce: u32) -> Result<[u8; HEADER_SIZE], FormatError> {
    let prev_block = reversed_hash("prev_block", &header.prev_block)?;
    let merkle_root = reversed_hash("merkle_root", &header.merkle_root)?;

    let mut out = [0u8; HEADER_SIZE];
    out[0..4].copy_from_slice(&header.version.to_le_bytes());
    out[4..36].copy_from_slice(&prev_block);
    out[36..68].copy_from_slice(&merkle_root);
    out[68..72].copy_from_slice(&header.timestamp.to_le_bytes());
    out[72..76].copy_from_slice(&header.bits.to_le_bytes());
    out[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
    Ok(out)
}

/// Narrow a wire-format integer into a `u32` header field.
pub fn check_u32(field: &'static str, value: i128) -> Result<u32, FormatError> {
    u32::try_from(value).map_err(|_| FormatError::OutOfRange { field, value })
}

/// Check that `value` is a 64 character hex string.
pub fn check_hash_hex(field: &'static str, value: &str) -> Result<(), FormatError> {
    if value.len() != HASH_HEX_SIZE {
        return Err(FormatError::HexLength {
            field,
            expected: HASH_HEX_SIZE,
            actual: value.len(),
        });
    }
    if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FormatError::NotHex { field });
    }
    Ok(())
}

/// Decode a displayed (big-endian) hash into wire order.
fn reversed_hash(field: &'static str, value: &str) -> Result<[u8; HASH_SIZE], FormatError> {
    check_hash_hex(field, value)?;
    let mut out = [0u8; HASH_SIZE];
    hex::decode_to_slice(value, &mut out).map_err(|_| FormatError::NotHex { field })?;
    out.reverse();
    Ok(out)
}

/// A header serialized once; only the trailing nonce word changes per guess.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderTemplate {
    bytes: [u8; HEADER_SIZE],
}

impl HeaderTemplate {
    pub fn new(header: &BlockHeader) -> Result<Self, FormatError> {
        Ok(Self {
            bytes: header_bytes(header, 0)?,
        })
    }

    pub fn nonce(&self) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[NONCE_OFFSET..]);
        u32::from_le_bytes(word)
    }

    pub fn set_nonce(&mut self, nonce: u32) -> &[u8; HEADER_SIZE] {
        self.bytes[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
        &self.bytes
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.bytes
    }
}
