//! Round-trip properties of the SLIP codec

use bootlink_core::slip::{decode, encode, encoded_len, END, ESC, ESC_END, ESC_ESC};
use proptest::prelude::*;

/// Bytes biased toward the ones the codec treats specially
fn slip_byte() -> impl Strategy<Value = u8> {
    prop_oneof![
        Just(END),
        Just(ESC),
        Just(ESC_END),
        Just(ESC_ESC),
        any::<u8>(),
    ]
}

proptest! {
    #[test]
    fn roundtrip_any_buffer(data in prop::collection::vec(slip_byte(), 0..256)) {
        let encoded = encode(&data);
        prop_assert_eq!(encoded.len(), encoded_len(&data));

        let frame = decode(&encoded);
        prop_assert!(frame.complete);
        prop_assert_eq!(&frame.payload, &data);
        prop_assert!(frame.remainder.is_empty());
    }

    #[test]
    fn trailing_bytes_become_remainder(
        data in prop::collection::vec(slip_byte(), 0..64),
        tail in prop::collection::vec(slip_byte(), 0..16),
    ) {
        let mut wire = encode(&data);
        wire.extend_from_slice(&tail);

        let frame = decode(&wire);
        prop_assert!(frame.complete);
        prop_assert_eq!(&frame.payload, &data);
        prop_assert_eq!(frame.remainder, &tail[..]);
    }
}
