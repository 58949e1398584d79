//! Line-oriented record codec.
//!
//! A record is persisted as one line:
//!
//! ```text
//! <key>\t<lowercase hex of MessagePack(value)>\n
//! ```
//!
//! Values go through `rmp-serde`, so any `serde` type can be stored; the hex
//! step keeps arbitrary binary payloads inside a text line. Keys are written
//! verbatim and therefore must not contain the delimiter or a line
//! terminator. Such keys are rejected rather than escaped, which keeps the
//! on-disk format readable by plain line tools.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Separates the key from the encoded value.
pub const DELIMITER: char = '\t';

/// Terminates every record.
pub const NEWLINE: u8 = b'\n';

const DELIMITER_BYTE: u8 = b'\t';

/// Characters that cannot appear in a raw key.
const RESERVED: [char; 3] = [DELIMITER, '\n', '\r'];

/// Checks that `key` can be written without breaking line framing.
///
/// # Errors
///
/// Returns [`CodecError::ReservedCharacter`] naming the first offending character.
pub fn validate_key(key: &str) -> Result<(), CodecError> {
    match key.chars().find(|c| RESERVED.contains(c)) {
        Some(found) => Err(CodecError::ReservedCharacter { found }),
        None => Ok(()),
    }
}

/// Appends the encoded line for `(key, value)` to `buf`, newline included.
///
/// On error `buf` is left exactly as it was.
///
/// # Errors
///
/// Returns an error if the key is reserved or the value cannot be serialized.
pub fn encode_into<V: Serialize + ?Sized>(
    buf: &mut Vec<u8>,
    key: &str,
    value: &V,
) -> Result<(), CodecError> {
    validate_key(key)?;
    let payload = rmp_serde::to_vec_named(value)?;
    buf.reserve(key.len() + 1 + payload.len() * 2 + 1);
    buf.extend_from_slice(key.as_bytes());
    buf.push(DELIMITER_BYTE);
    buf.extend_from_slice(hex::encode(payload).as_bytes());
    buf.push(NEWLINE);
    Ok(())
}

/// Encodes `(key, value)` into a fresh line, newline included.
///
/// # Errors
///
/// Returns an error if the key is reserved or the value cannot be serialized.
pub fn encode<V: Serialize + ?Sized>(key: &str, value: &V) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_into(&mut buf, key, value)?;
    Ok(buf)
}

/// Decodes one stored line back into `(key, value)`.
///
/// A single trailing `\n`, optionally preceded by `\r`, is ignored. The key
/// ends at the first delimiter; everything after it is the hex payload.
///
/// # Errors
///
/// Returns an error if the delimiter is missing, the key is not UTF-8, the
/// payload is not hex, or the bytes do not deserialize into `V`.
pub fn decode<V: DeserializeOwned>(line: &[u8]) -> Result<(String, V), CodecError> {
    let line = trim_line_end(line);
    let split = line
        .iter()
        .position(|&b| b == DELIMITER_BYTE)
        .ok_or(CodecError::MissingDelimiter)?;
    let (key, rest) = line.split_at(split);
    let key = std::str::from_utf8(key).map_err(|_| CodecError::InvalidKey)?;
    let payload = hex::decode(&rest[1..])?;
    let value = rmp_serde::from_slice(&payload)?;
    Ok((key.to_string(), value))
}

/// Whether `line` carries no record (empty apart from its terminator).
#[must_use]
pub fn is_blank(line: &[u8]) -> bool {
    trim_line_end(line).is_empty()
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
