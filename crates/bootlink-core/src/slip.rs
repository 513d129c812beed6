//! SLIP framing (RFC 1055)
//!
//! Bootloader packets travel as `END payload END` with END and ESC bytes
//! inside the payload escaped. Decoding is stateless: the caller hands over
//! everything it has buffered and keeps whatever [`SlipFrame::remainder`]
//! says was not consumed.

use alloc::vec::Vec;

/// Frame boundary
pub const END: u8 = 0xC0;
/// Escape introducer
pub const ESC: u8 = 0xDB;
/// Escaped END (follows ESC)
pub const ESC_END: u8 = 0xDC;
/// Escaped ESC (follows ESC)
pub const ESC_ESC: u8 = 0xDD;

/// Result of scanning a buffer for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlipFrame<'a> {
    /// Unescaped frame contents (empty when `complete` is false)
    pub payload: Vec<u8>,
    /// Bytes that were not consumed by this frame
    pub remainder: &'a [u8],
    /// Whether an `END ... END` span was found
    pub complete: bool,
}

/// Number of bytes `encode(data)` produces
pub fn encoded_len(data: &[u8]) -> usize {
    let escapes = data.iter().filter(|&&b| b == END || b == ESC).count();
    data.len() + escapes + 2
}

/// Append the escaped form of `data` to `out`, without frame delimiters
pub fn escape_into(data: &[u8], out: &mut Vec<u8>) {
    for &byte in data {
        match byte {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            _ => out.push(byte),
        }
    }
}

/// Wrap `data` in a SLIP frame
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(data));
    out.push(END);
    escape_into(data, &mut out);
    out.push(END);
    out
}

/// Extract the first complete frame from `data`
///
/// Anything before the opening END is dropped. When no closing END is found
/// the whole input is handed back as the remainder so the caller can wait
/// for more bytes.
pub fn decode(data: &[u8]) -> SlipFrame<'_> {
    let span = data.iter().position(|&b| b == END).and_then(|start| {
        data[start + 1..]
            .iter()
            .position(|&b| b == END)
            .map(|len| (start + 1, start + 1 + len))
    });

    let Some((start, end)) = span else {
        return SlipFrame {
            payload: Vec::new(),
            remainder: data,
            complete: false,
        };
    };

    // `end` indexes the closing END; the remainder begins right after it.
    // With the last interior byte at `end - 1` this is the `last + 2` offset
    // bootloader peers expect.
    SlipFrame {
        payload: unescape(&data[start..end]),
        remainder: &data[end + 1..],
        complete: true,
    }
}

fn unescape(interior: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(interior.len());
    let mut i = 0;
    while i < interior.len() {
        let byte = interior[i];
        if byte == ESC {
            match interior.get(i + 1) {
                Some(&ESC_END) => {
                    out.push(END);
                    i += 2;
                    continue;
                }
                Some(&ESC_ESC) => {
                    out.push(ESC);
                    i += 2;
                    continue;
                }
                // Unknown or truncated escape passes through as-is
                _ => {}
            }
        }
        out.push(byte);
        i += 1;
    }
    out
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_encode_plain() {
        assert_eq!(encode(&[0x01, 0x02, 0x03]), vec![END, 0x01, 0x02, 0x03, END]);
    }

    #[test]
    fn test_encode_escapes() {
        assert_eq!(encode(&[END]), vec![END, ESC, ESC_END, END]);
        assert_eq!(encode(&[ESC]), vec![END, ESC, ESC_ESC, END]);
        assert_eq!(encode(&[]), vec![END, END]);
    }

    #[test]
    fn test_encoded_len_matches() {
        let data = [0x00, END, ESC, END, 0x42, ESC];
        assert_eq!(encoded_len(&data), data.len() + 2 + 4);
        assert_eq!(encode(&data).len(), encoded_len(&data));
    }

    #[test]
    fn test_roundtrip_special_bytes() {
        let cases: [&[u8]; 6] = [
            &[],
            &[END],
            &[ESC],
            &[END, ESC, ESC, END],
            &[ESC, ESC_END, END, ESC_ESC],
            &[0x00, 0xFF, END, 0x10, ESC],
        ];
        for case in cases {
            let encoded = encode(case);
            let frame = decode(&encoded);
            assert!(frame.complete, "case {:02X?}", case);
            assert_eq!(frame.payload, case);
            assert!(frame.remainder.is_empty());
        }
    }

    #[test]
    fn test_decode_missing_closing_end() {
        let data = [END, 0x01, 0x02, 0x03];
        let frame = decode(&data);
        assert!(!frame.complete);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.remainder, &data);
    }

    #[test]
    fn test_decode_no_end_at_all() {
        let data = [0x01, 0x02];
        let frame = decode(&data);
        assert!(!frame.complete);
        assert_eq!(frame.remainder, &data);
    }

    #[test]
    fn test_decode_remainder_offset() {
        // Remainder starts immediately after the closing END
        let data = [END, 0x01, 0x02, END, 0xAA, 0xBB];
        let frame = decode(&data);
        assert!(frame.complete);
        assert_eq!(frame.payload, vec![0x01, 0x02]);
        assert_eq!(frame.remainder, &[0xAA, 0xBB]);

        let data = [END, END, 0x55];
        let frame = decode(&data);
        assert!(frame.complete);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.remainder, &[0x55]);
    }

    #[test]
    fn test_decode_skips_leading_garbage() {
        let data = [0x11, 0x22, END, 0x33, END];
        let frame = decode(&data);
        assert_eq!(frame.payload, vec![0x33]);
        assert!(frame.remainder.is_empty());
    }

    #[test]
    fn test_decode_two_frames() {
        let mut data = encode(&[0x01, END]);
        data.extend_from_slice(&encode(&[0x02]));

        let first = decode(&data);
        assert_eq!(first.payload, vec![0x01, END]);
        let second = decode(first.remainder);
        assert!(second.complete);
        assert_eq!(second.payload, vec![0x02]);
        assert!(second.remainder.is_empty());
    }

    #[test]
    fn test_decode_unknown_escape_passes_through() {
        let data = [END, ESC, 0x01, ESC, END];
        let frame = decode(&data);
        assert!(frame.complete);
        assert_eq!(frame.payload, vec![ESC, 0x01, ESC]);
    }
}
