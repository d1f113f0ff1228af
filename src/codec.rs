//! Wire codec for the ABX exchange protocol.
//!
//! Requests are two bytes: `[call_type][sequence]`. Every response record is
//! exactly [`PACKET_LEN`] bytes with big-endian integers laid out as:
//!
//! | field    | bytes      | encoding                          |
//! |----------|------------|-----------------------------------|
//! | symbol   | `0..4`     | ASCII, space or NUL padded        |
//! | sequence | `4..8`     | `i32`                             |
//! | side     | `8`        | raw byte, e.g. `B` / `S`          |
//! | quantity | `9..12`    | unsigned 24-bit                   |
//! | price    | `12..16`   | `i32`                             |
//!
//! No two fields share a byte.
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};

/// Size of one request on the wire.
pub const REQUEST_LEN: usize = 2;
/// Size of one response record on the wire.
pub const PACKET_LEN: usize = 16;
/// Largest quantity the 24-bit wire field can carry.
pub const MAX_QUANTITY: i32 = 0x00FF_FFFF;

const SYMBOL: std::ops::Range<usize> = 0..4;
const SEQUENCE: std::ops::Range<usize> = 4..8;
const SIDE: usize = 8;
const QUANTITY: std::ops::Range<usize> = 9..12;
const PRICE: std::ops::Range<usize> = 12..16;

/// Protocol opcode of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallType {
    /// Replay every packet; the server closes the stream afterwards.
    StreamAll = 1,
    /// Send back the single packet with the given sequence number.
    ResendBySequence = 2,
}

/// One market-data record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub symbol: String,
    #[serde(rename = "buySellIndicator")]
    pub side: char,
    pub quantity: i32,
    pub price: i32,
    #[serde(rename = "sequenceNumber")]
    pub sequence: i32,
}

/// Build the two request bytes for `call_type`.
///
/// Resend requests can only address sequence numbers `0..=255`; see
/// [`resend_target`].
pub fn encode_request(call_type: CallType, sequence: u8) -> [u8; REQUEST_LEN] {
    [call_type as u8, sequence]
}

/// The request byte for `sequence`, or `None` when the protocol cannot address it.
pub fn resend_target(sequence: i32) -> Option<u8> {
    u8::try_from(sequence).ok()
}

/// Decode one record from the first [`PACKET_LEN`] bytes of `buf`.
pub fn decode_packet(buf: &[u8]) -> Result<Packet> {
    if buf.len() < PACKET_LEN {
        return Err(ClientError::MalformedPacket { len: buf.len() });
    }
    let symbol: String = buf[SYMBOL]
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end_matches([' ', '\0'])
        .to_string();
    let read_i32 = |r: std::ops::Range<usize>| -> i32 {
        let mut tmp = [0u8; 4];
        tmp.copy_from_slice(&buf[r]);
        i32::from_be_bytes(tmp)
    };
    let mut qty = [0u8; 4];
    qty[1..].copy_from_slice(&buf[QUANTITY]);

    Ok(Packet {
        symbol,
        side: buf[SIDE] as char,
        quantity: i32::from_be_bytes(qty),
        price: read_i32(PRICE),
        sequence: read_i32(SEQUENCE),
    })
}

/// Encode `packet` into a wire record. Inverse of [`decode_packet`].
pub fn encode_packet(packet: &Packet) -> Result<[u8; PACKET_LEN]> {
    if !packet.symbol.is_ascii() || packet.symbol.len() > SYMBOL.len() {
        return Err(ClientError::InvalidPacket(format!(
            "symbol {:?} is not at most 4 ASCII characters",
            packet.symbol
        )));
    }
    let side = u8::try_from(packet.side).map_err(|_| {
        ClientError::InvalidPacket(format!("side {:?} does not fit in one byte", packet.side))
    })?;
    if !(0..=MAX_QUANTITY).contains(&packet.quantity) {
        return Err(ClientError::InvalidPacket(format!(
            "quantity {} outside 0..={MAX_QUANTITY}",
            packet.quantity
        )));
    }

    let mut out = [b' '; PACKET_LEN];
    out[..packet.symbol.len()].copy_from_slice(packet.symbol.as_bytes());
    out[SEQUENCE].copy_from_slice(&packet.sequence.to_be_bytes());
    out[SIDE] = side;
    out[QUANTITY].copy_from_slice(&packet.quantity.to_be_bytes()[1..]);
    out[PRICE].copy_from_slice(&packet.price.to_be_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn msft(sequence: i32) -> Packet {
        Packet {
            symbol: "MSFT".into(),
            side: 'B',
            quantity: 50,
            price: 100,
            sequence,
        }
    }

    #[test]
    fn request_bytes() {
        assert_eq!(encode_request(CallType::StreamAll, 0), [1, 0]);
        assert_eq!(encode_request(CallType::ResendBySequence, 200), [2, 200]);
    }

    #[test]
    fn resend_target_is_eight_bit() {
        assert_eq!(resend_target(0), Some(0));
        assert_eq!(resend_target(255), Some(255));
        assert_eq!(resend_target(256), None);
        assert_eq!(resend_target(-1), None);
    }

    #[test]
    fn decode_known_layout() {
        let buf = [
            b'A', b'A', b'P', b'L', // symbol
            0, 0, 0, 7, // sequence
            b'S', // side
            0, 1, 0x2C, // quantity = 300
            0xFF, 0xFF, 0xFF, 0xFE, // price = -2
        ];
        let p = decode_packet(&buf).unwrap();
        assert_eq!(p.symbol, "AAPL");
        assert_eq!(p.sequence, 7);
        assert_eq!(p.side, 'S');
        assert_eq!(p.quantity, 300);
        assert_eq!(p.price, -2);
    }

    #[test]
    fn symbol_padding_is_trimmed() {
        let mut buf = encode_packet(&msft(1)).unwrap();
        buf[2] = 0;
        buf[3] = 0;
        assert_eq!(decode_packet(&buf).unwrap().symbol, "MS");
        buf[2] = b' ';
        assert_eq!(decode_packet(&buf).unwrap().symbol, "MS");
    }

    #[test]
    fn short_buffer_is_malformed() {
        let err = decode_packet(&[0u8; 15]).unwrap_err();
        assert!(matches!(err, ClientError::MalformedPacket { len: 15 }));
        assert!(matches!(decode_packet(&[]), Err(ClientError::MalformedPacket { len: 0 })));
    }

    #[test]
    fn encode_rejects_unrepresentable_values() {
        let mut p = msft(1);
        p.symbol = "GOOGL".into();
        assert!(matches!(encode_packet(&p), Err(ClientError::InvalidPacket(_))));

        let mut p = msft(1);
        p.quantity = MAX_QUANTITY + 1;
        assert!(encode_packet(&p).is_err());
        p.quantity = -1;
        assert!(encode_packet(&p).is_err());

        let mut p = msft(1);
        p.side = 'é';
        assert!(encode_packet(&p).is_ok());
        p.side = '€';
        assert!(encode_packet(&p).is_err());
    }

    #[test]
    fn encode_then_decode_preserves_packet() {
        let p = msft(42);
        assert_eq!(decode_packet(&encode_packet(&p).unwrap()).unwrap(), p);
    }

    proptest! {
        #[test]
        fn decode_is_total_and_reencodes(bytes in proptest::array::uniform16(any::<u8>())) {
            let a = decode_packet(&bytes).unwrap();
            let b = decode_packet(&bytes).unwrap();
            prop_assert_eq!(&a, &b);

            let mut p = a.clone();
            p.symbol = "X".into();
            let again = decode_packet(&encode_packet(&p).unwrap()).unwrap();
            prop_assert_eq!(again.sequence, a.sequence);
            prop_assert_eq!(again.quantity, a.quantity);
            prop_assert_eq!(again.price, a.price);
            prop_assert_eq!(again.side, a.side);
        }
    }
}
