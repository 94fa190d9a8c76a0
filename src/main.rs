//! Replay tool for captured band traffic
//!
//! Feeds a capture file through a [`BandSession`] with a logging transport and
//! a logging event sink, or unpacks a single step slot.

use bandlink::records::StepSlot;
use bandlink::types::{hex_dump, parse_hex};
use bandlink::{
    BandError, BandSession, CorrelationKey, Disposition, LogSink, LoggingTransport,
    ProductDescriptor,
};
use chrono::Local;
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "bandlink")]
#[command(about = "Replay captured fitness band frames through the protocol engine")]
struct Args {
    /// Product descriptor (JSON)
    #[arg(long, value_name = "FILE")]
    descriptor: Option<PathBuf>,

    /// Capture to replay: one frame per line, optionally prefixed by `#key`
    #[arg(long, value_name = "FILE", requires = "descriptor")]
    capture: Option<PathBuf>,

    /// Channel the captured frames arrived on
    #[arg(long, default_value = "notify")]
    channel: String,

    /// Unpack a 6-byte step slot given as hex
    #[arg(long, value_name = "HEX")]
    decode_slot: Option<String>,
}

type CapturedFrame = (Option<CorrelationKey>, Vec<u8>);

/// One capture line: `[#key ]hex bytes`; blank lines and `//` comments yield nothing
fn parse_capture_line(line: &str) -> bandlink::Result<Option<CapturedFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") {
        return Ok(None);
    }
    let (key, hex) = match line.strip_prefix('#') {
        Some(rest) => {
            let (raw, hex) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let raw: u64 = raw
                .parse()
                .map_err(|_| BandError::InvalidHex(format!("bad key in '{}'", line)))?;
            (Some(CorrelationKey::from_raw(raw)), hex)
        }
        None => (None, line),
    };
    let bytes = parse_hex(hex)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some((key, bytes)))
}

fn decode_slot(hex: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = parse_hex(hex)?;
    if bytes.len() != 6 {
        return Err(Box::new(BandError::InvalidParameter(format!(
            "step slot is 6 bytes, got {}",
            bytes.len()
        ))));
    }
    let slot = StepSlot::unpack(0, Local::now().naive_local(), &bytes);
    println!("{}", serde_json::to_string_pretty(&slot)?);
    Ok(())
}

async fn replay(
    descriptor: ProductDescriptor,
    capture: &str,
    channel: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = LoggingTransport::new();
    let session = BandSession::new(descriptor, Arc::new(transport.clone()), Arc::new(LogSink))?;

    let (mut events, mut routed, mut ignored) = (0usize, 0usize, 0usize);
    for (n, line) in capture.lines().enumerate() {
        let (key, frame) = match parse_capture_line(line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                warn!("Line {}: {}", n + 1, e);
                continue;
            }
        };
        let disposition = session.on_frame(channel, &frame, key).await?;
        debug!("Line {}: [{}] {}", n + 1, hex_dump(&frame), disposition);
        match disposition {
            Disposition::Event(_) => events += 1,
            Disposition::Routed { .. } | Disposition::Failed(_) => routed += 1,
            Disposition::Ignored => ignored += 1,
        }
    }

    let stats = session.registry().stats();
    println!(
        "Replayed: {} events, {} routed, {} ignored, {} frames written, {} in flight",
        events,
        routed,
        ignored,
        transport.written().len(),
        stats.in_flight
    );
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(hex) = &args.decode_slot {
        decode_slot(hex)?;
    }

    let Some(path) = &args.descriptor else {
        if args.decode_slot.is_none() {
            warn!("Nothing to do: give --descriptor or --decode-slot");
        }
        return Ok(());
    };
    let descriptor = ProductDescriptor::from_json(&tokio::fs::read_to_string(path).await?)?;
    info!("Loaded {} (family {})", descriptor.model, descriptor.family);

    if let Some(capture) = &args.capture {
        let text = tokio::fs::read_to_string(capture).await?;
        replay(descriptor, &text, &args.channel).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_line() {
        assert_eq!(
            parse_capture_line("07 02 00").unwrap(),
            Some((None, vec![0x07, 0x02, 0x00]))
        );
        assert_eq!(
            parse_capture_line("  #12 9A0101 01 ").unwrap(),
            Some((Some(CorrelationKey::from_raw(12)), vec![0x9A, 0x01, 0x01, 0x01]))
        );
        assert_eq!(parse_capture_line("// camera open").unwrap(), None);
        assert_eq!(parse_capture_line("").unwrap(), None);
        assert!(parse_capture_line("#x 07").is_err());
        assert!(parse_capture_line("0 7 1").is_err());
        assert!(parse_capture_line("#3 9A01€1").is_err());
    }

    #[test]
    fn test_decode_slot_length() {
        assert!(decode_slot("44 B1 42 A0 D2").is_err());
        assert!(decode_slot("44 B1 42 A0 D2 FF").is_ok());
    }

    #[tokio::test]
    async fn test_replay_capture() {
        let descriptor = ProductDescriptor::from_json(
            r#"{"model": "replay", "family": "C",
                "channels": {"control_write": "w", "control_notify": "n"}}"#,
        )
        .unwrap();
        let capture = "// find phone, then camera open\n\
                       40 01 0100 01 A5\n\
                       #3 40 02 0100 00 A5\n";
        replay(descriptor, capture, "n").await.unwrap();
    }
}
