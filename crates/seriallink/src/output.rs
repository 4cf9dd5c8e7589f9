use std::io::IsTerminal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use seriallink_frame::ids::packet_name;
use seriallink_frame::{Packet, PacketId, PACKET_ID_FIELD};
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
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Packet {
        port: &'a str,
        packet_id: PacketId,
        name: &'static str,
        fields: &'a Packet,
        timestamp: String,
    },
    Line {
        port: &'a str,
        text: &'a str,
        timestamp: String,
    },
    Ping {
        port: &'a str,
        seq: u32,
        rtt_ms: f64,
    },
    Sent {
        port: &'a str,
        packet_id: PacketId,
        name: &'static str,
        payload_size: usize,
    },
}

fn print_json(record: &Record<'_>) {
    println!(
        "{}",
        serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_packet(packet: &Packet, port: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Packet {
            port,
            packet_id: packet.id(),
            name: packet_name(packet.id()),
            fields: packet,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PACKET", "FIELD", "VALUE"]);
            let label = format!("{} ({})", packet.id(), packet_name(packet.id()));
            for (name, value) in packet.fields() {
                if name != PACKET_ID_FIELD {
                    table.add_row(vec![label.clone(), name.to_string(), value.to_string()]);
                }
            }
            if packet.len() == 1 {
                table.add_row(vec![label, "-".to_string(), "-".to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("packet {} ({}) {packet}", packet.id(), packet_name(packet.id()));
        }
        OutputFormat::Raw => println!("{packet}"),
    }
}

pub fn print_line(text: &str, port: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Line {
            port,
            text,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "LINE"]);
            table.add_row(vec![port, text]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("line   {text}"),
        OutputFormat::Raw => println!("{text}"),
    }
}

pub fn print_ping(seq: u32, rtt: Duration, port: &str, format: OutputFormat) {
    let rtt_ms = (rtt.as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    match format {
        OutputFormat::Json => print_json(&Record::Ping { port, seq, rtt_ms }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "SEQ", "RTT (ms)"]);
            table.add_row(vec![port.to_string(), seq.to_string(), rtt_ms.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("reply from {port}: seq={seq} time={rtt_ms}ms");
        }
    }
}

pub fn print_sent(id: PacketId, payload_size: usize, port: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Sent {
            port,
            packet_id: id,
            name: packet_name(id),
            payload_size,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "PACKET", "SIZE"]);
            table.add_row(vec![
                port.to_string(),
                format!("{id} ({})", packet_name(id)),
                payload_size.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("sent packet {id} ({}) to {port}, {payload_size} bytes", packet_name(id));
        }
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
    fn packet_record_is_flat_json() {
        let packet = Packet::new(1).with_field("sequenceNum", 5u32);
        let record = Record::Packet {
            port: "COM3",
            packet_id: packet.id(),
            name: packet_name(packet.id()),
            fields: &packet,
            timestamp: "0".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "packet");
        assert_eq!(json["name"], "PING_REPLY");
        assert_eq!(json["fields"]["sequenceNum"], 5);
        assert_eq!(json["fields"]["packetID"], 1);
    }

    #[test]
    fn line_record_has_kind_tag() {
        let record = Record::Line {
            port: "COM3",
            text: "ready",
            timestamp: "0".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "line");
        assert_eq!(json["text"], "ready");
    }
}
