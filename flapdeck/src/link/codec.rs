//! Frame codec: CRC32 integrity plus COBS byte stuffing.
//!
//! Wire frames are `COBS(payload ‖ crc32le(payload) ‖ 0x00)` followed by a
//! single `0x00` delimiter. The zero inside the stuffed region is the
//! firmware's in-band terminator; it comes back out of the COBS decode and
//! is stripped before the CRC check.

/// Encode a payload into a delimited wire frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 5);
    body.extend_from_slice(payload);
    body.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    body.push(0);

    let mut frame = cobs::encode_vec(&body);
    frame.push(0);
    frame
}

/// Decode a wire frame (with its trailing `0x00` delimiter already
/// stripped). Returns the payload, or `None` on any framing or CRC failure.
pub fn decode_frame(frame: &[u8]) -> Option<Vec<u8>> {
    let decoded = cobs::decode_vec(frame).ok()?;
    if decoded.is_empty() {
        return None;
    }
    // drop the in-band terminator
    let decoded = &decoded[..decoded.len() - 1];
    if decoded.len() < 4 {
        return None;
    }

    let (payload, crc_bytes) = decoded.split_at(decoded.len() - 4);
    let provided = u32::from_le_bytes(crc_bytes.try_into().ok()?);
    if crc32fast::hash(payload) != provided {
        return None;
    }
    Some(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = [0x01, 0x02, 0x03];
        let frame = encode_frame(&payload);
        assert_eq!(*frame.last().unwrap(), 0, "frame must end with delimiter");
        let decoded = decode_frame(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_round_trip_with_embedded_zeros() {
        let payload = [0x00, 0xFF, 0x00, 0x00, 0x42];
        let frame = encode_frame(&payload);
        // COBS output contains no zero before the delimiter
        assert!(!frame[..frame.len() - 1].contains(&0));
        let decoded = decode_frame(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_bit_flip_fails_crc() {
        let payload = b"splitflap";
        let frame = encode_frame(payload);
        let body_len = frame.len() - 1;
        for i in 0..body_len {
            for bit in 0..8 {
                let mut corrupted = frame[..body_len].to_vec();
                corrupted[i] ^= 1 << bit;
                // a flip may break COBS structure or the CRC; either way the
                // frame must not decode to the original payload
                if let Some(decoded) = decode_frame(&corrupted) {
                    assert_ne!(decoded, payload.to_vec(), "byte {i} bit {bit}");
                }
            }
        }
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(decode_frame(&[]), None);
    }

    #[test]
    fn test_too_short_fails() {
        // a valid COBS encoding of fewer than 5 bytes cannot carry a CRC
        // plus terminator
        let short = cobs::encode_vec(&[0x01, 0x02]);
        assert_eq!(decode_frame(&short), None);
    }

    #[test]
    fn test_empty_payload_round_trips() {
        let frame = encode_frame(&[]);
        let decoded = decode_frame(&frame[..frame.len() - 1]).unwrap();
        assert!(decoded.is_empty());
    }
}
