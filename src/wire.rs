//! Wire encoding for collective payloads.
//!
//! All integers are little-endian.
//!
//! ```text
//! scalar:     [value: u64]
//! word array: [len: u32][len x u64]
//! byte array: [len: u32][len x u8]
//! ```
//!
//! A frame holds exactly one value; trailing bytes are rejected.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WireError {
    #[error("frame truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("{0} trailing bytes after value")]
    Trailing(usize),

    #[error("array of {0} elements does not fit a u32 length prefix")]
    TooLong(usize),
}

pub fn encode_scalar(value: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64_le(value);
    buf.freeze()
}

pub fn decode_scalar(mut frame: Bytes) -> Result<u64, WireError> {
    need(&frame, 8)?;
    let value = frame.get_u64_le();
    finish(&frame)?;
    Ok(value)
}

pub fn encode_words(words: &[u64]) -> Result<Bytes, WireError> {
    let len = u32::try_from(words.len()).map_err(|_| WireError::TooLong(words.len()))?;
    let mut buf = BytesMut::with_capacity(4 + words.len() * 8);
    buf.put_u32_le(len);
    for word in words {
        buf.put_u64_le(*word);
    }
    Ok(buf.freeze())
}

pub fn decode_words(mut frame: Bytes) -> Result<Vec<u64>, WireError> {
    need(&frame, 4)?;
    let len = frame.get_u32_le() as usize;
    need(&frame, len * 8)?;
    let words: Vec<u64> = (0..len).map(|_| frame.get_u64_le()).collect();
    finish(&frame)?;
    Ok(words)
}

pub fn encode_bytes(data: &[u8]) -> Result<Bytes, WireError> {
    let len = u32::try_from(data.len()).map_err(|_| WireError::TooLong(data.len()))?;
    let mut buf = BytesMut::with_capacity(4 + data.len());
    buf.put_u32_le(len);
    buf.put_slice(data);
    Ok(buf.freeze())
}

pub fn decode_bytes(mut frame: Bytes) -> Result<Bytes, WireError> {
    need(&frame, 4)?;
    let len = frame.get_u32_le() as usize;
    need(&frame, len)?;
    let data = frame.split_to(len);
    finish(&frame)?;
    Ok(data)
}

impl From<WireError> for crate::error::RankError {
    fn from(err: WireError) -> Self {
        crate::error::RankError::CommunicationFault(format!("undecodable frame: {err}"))
    }
}

fn need(frame: &Bytes, n: usize) -> Result<(), WireError> {
    if frame.remaining() < n {
        return Err(WireError::Truncated {
            need: n,
            have: frame.remaining(),
        });
    }
    Ok(())
}

fn finish(frame: &Bytes) -> Result<(), WireError> {
    match frame.remaining() {
        0 => Ok(()),
        n => Err(WireError::Trailing(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_layout_is_little_endian() {
        let frame = encode_scalar(0x0102);
        assert_eq!(&frame[..], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_scalar(frame), Ok(0x0102));
    }

    #[test]
    fn test_words_are_length_prefixed() {
        let frame = encode_words(&[7, 9]).unwrap();
        assert_eq!(frame.len(), 4 + 16);
        assert_eq!(&frame[..4], &[2, 0, 0, 0]);
        assert_eq!(decode_words(frame), Ok(vec![7, 9]));
    }

    #[test]
    fn test_truncated_words_are_rejected() {
        let frame = encode_words(&[1, 2, 3]).unwrap();
        let cut = frame.slice(..frame.len() - 1);
        assert_eq!(
            decode_words(cut),
            Err(WireError::Truncated { need: 24, have: 23 })
        );
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut raw = BytesMut::new();
        raw.put_u64_le(5);
        raw.put_u8(0xFF);
        assert_eq!(decode_scalar(raw.freeze()), Err(WireError::Trailing(1)));
    }

    #[test]
    fn test_empty_byte_array() {
        let frame = encode_bytes(b"").unwrap();
        assert_eq!(frame.len(), 4);
        assert!(decode_bytes(frame).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_decoded_from_short_frame() {
        let frame = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(
            decode_scalar(frame),
            Err(WireError::Truncated { need: 8, have: 3 })
        );
    }
}
