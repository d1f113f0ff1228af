//! Capture file schema and framing.
//!
//! A capture is a sequence of frames `[len: u32 LE][crc32: u32 LE][payload]`
//! where the payload is a bincode-encoded [`RecordFrame`]. The first frame is a
//! [`FileHeader`], followed by one [`RecordFrame::Packet`] per packet in
//! sequence order.
use crate::codec::Packet;
use crate::error::{ClientError, Result};
use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::ops::RangeInclusive;

pub const CAPTURE_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: u16,
    pub created_unix_ns: u128,
    pub server: String,
    pub port: u16,
    /// Sequences still missing when the run finished, as inclusive ranges.
    pub missing: Vec<RangeInclusive<i32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFrame {
    Header(FileHeader),
    Packet(Packet),
}

fn crc_of(payload: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(payload);
    hasher.finalize()
}

pub fn write_frame<W: Write>(w: &mut W, frame: &RecordFrame) -> Result<()> {
    let payload = bincode::serialize(frame).map_err(|e| ClientError::Capture(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| ClientError::Capture("frame larger than 4 GiB".into()))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc_of(&payload).to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read the next frame; `Ok(None)` at a clean end of file.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<RecordFrame>> {
    let len = match read_u32(r) {
        Ok(v) => v as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let crc_on_file = read_u32(r)?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    let crc_calc = crc_of(&payload);
    if crc_calc != crc_on_file {
        return Err(ClientError::Capture(format!(
            "CRC mismatch: file={crc_on_file:#x}, calc={crc_calc:#x}"
        )));
    }
    let frame = bincode::deserialize(&payload).map_err(|e| ClientError::Capture(e.to_string()))?;
    Ok(Some(frame))
}

/// Write a whole capture: header first, then every packet.
pub fn write_capture<W: Write>(w: &mut W, header: &FileHeader, packets: &[Packet]) -> Result<()> {
    write_frame(w, &RecordFrame::Header(header.clone()))?;
    for p in packets {
        write_frame(w, &RecordFrame::Packet(p.clone()))?;
    }
    w.flush()?;
    Ok(())
}

/// Read a whole capture written by [`write_capture`].
pub fn read_capture<R: Read>(r: &mut R) -> Result<(FileHeader, Vec<Packet>)> {
    let header = match read_frame(r)? {
        Some(RecordFrame::Header(h)) => h,
        Some(RecordFrame::Packet(_)) => {
            return Err(ClientError::Capture("capture does not start with a header".into()));
        }
        None => return Err(ClientError::Capture("empty capture".into())),
    };
    let mut packets = Vec::new();
    while let Some(frame) = read_frame(r)? {
        match frame {
            RecordFrame::Packet(p) => packets.push(p),
            RecordFrame::Header(_) => {
                return Err(ClientError::Capture("second header in capture".into()));
            }
        }
    }
    Ok((header, packets))
}
