use abx_client::logging;
use abx_client::record::{read_frame, RecordFrame};
use abx_client::tracker::SequenceTracker;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(about = "Play a recorded ABX capture and report sequence gaps")]
struct Args {
    /// Input file path to read (recorded .bin)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Print every packet as it is read
    #[arg(long, default_value_t = false)]
    dump: bool,

    /// Print packets as JSON lines instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(false);
    let mut rdr = BufReader::new(File::open(&args.input).with_context(|| format!("open {:?}", args.input))?);
    let mut tracker = SequenceTracker::new();
    let mut frames = 0usize;
    let mut duplicates = 0usize;

    while let Some(frame) = read_frame(&mut rdr).with_context(|| format!("frame {frames}"))? {
        frames += 1;
        match frame {
            RecordFrame::Header(h) => {
                eprintln!(
                    "Header: v{} {}:{} created={}ns missing_at_capture={:?}",
                    h.version, h.server, h.port, h.created_unix_ns, h.missing
                );
            }
            RecordFrame::Packet(p) => {
                let before = tracker.len();
                tracker.record_seen(p.sequence);
                if tracker.len() == before {
                    duplicates += 1;
                    warn!(sequence = p.sequence, "duplicate sequence in capture");
                }
                if args.json {
                    println!("{}", serde_json::to_string(&p)?);
                } else if args.dump {
                    println!(
                        "seq={:>6} {:<4} {} qty={:>8} price={:>10}",
                        p.sequence, p.symbol, p.side, p.quantity, p.price
                    );
                }
            }
        }
    }

    let missing: Vec<_> = tracker.missing().ranges().collect();
    eprintln!(
        "Read {} frames. {} packets, range {:?}..={:?}, {} duplicates, {} missing in {:?}.",
        frames,
        tracker.len(),
        tracker.min_seen(),
        tracker.max_seen(),
        duplicates,
        tracker.missing().len(),
        missing
    );
    Ok(())
}
