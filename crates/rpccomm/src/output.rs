use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rpccomm_communicator::Meta;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    opcode: u32,
    size: u64,
    checksum: String,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(meta: &Meta, payload: &[u8], peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                opcode: meta.opcode,
                size: meta.size,
                checksum: format!("{:016x}", meta.checksum),
                payload: payload_preview(payload),
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPCODE", "SIZE", "CHECKSUM", "PEER", "PAYLOAD"])
                .add_row(vec![
                    meta.opcode.to_string(),
                    meta.size.to_string(),
                    format!("{:016x}", meta.checksum),
                    peer.to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "opcode={} size={} checksum={:016x} peer={} payload={}",
                meta.opcode,
                meta.size,
                meta.checksum,
                peer,
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_payloads_are_summarized() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0xff, 0xfe, 0x00]), "<binary 3 bytes>");
    }

    #[test]
    fn json_fields_serialize() {
        let out = MessageOutput {
            opcode: 7,
            size: 2,
            checksum: "00000000000000ff".to_string(),
            payload: "hi".to_string(),
            peer: "tcp://127.0.0.1:9",
            timestamp: "0".to_string(),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"opcode\":7"));
        assert!(json.contains("\"peer\":\"tcp://127.0.0.1:9\""));
    }
}
