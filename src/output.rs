//! Persisting a finished run.
use crate::codec::Packet;
use crate::error::{ClientError, Result};
use crate::record::{write_capture, FileHeader};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// On-disk encoding of the packet list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON array.
    #[default]
    Json,
    /// CRC-framed bincode capture, readable by `player`.
    Capture,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Capture => "bin",
        }
    }
}

/// `output/abx_YYYY_MM_DD.<ext>` for the current local date (UTC if the local
/// offset cannot be determined).
pub fn default_output_path(format: OutputFormat) -> PathBuf {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let d = now.date();
    let mut p = PathBuf::from("output");
    p.push(format!(
        "abx_{}_{:02}_{:02}.{}",
        d.year(),
        d.month() as u8,
        d.day(),
        format.extension()
    ));
    p
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

pub fn write_json(path: &Path, packets: &[Packet]) -> Result<()> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, packets)
        .map_err(|e| ClientError::Io(std::io::Error::other(e)))?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

pub fn write_capture_file(path: &Path, header: &FileHeader, packets: &[Packet]) -> Result<()> {
    let mut w = create(path)?;
    write_capture(&mut w, header, packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_wire_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let packets = vec![Packet {
            symbol: "MSFT".into(),
            side: 'B',
            quantity: 50,
            price: 100,
            sequence: 1,
        }];
        write_json(&path, &packets).unwrap();

        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let rec = &v[0];
        assert_eq!(rec["symbol"], "MSFT");
        assert_eq!(rec["buySellIndicator"], "B");
        assert_eq!(rec["quantity"], 50);
        assert_eq!(rec["price"], 100);
        assert_eq!(rec["sequenceNumber"], 1);
    }

    #[test]
    fn default_path_carries_extension() {
        let p = default_output_path(OutputFormat::Capture);
        assert!(p.starts_with("output"));
        assert_eq!(p.extension().and_then(|e| e.to_str()), Some("bin"));
    }
}
