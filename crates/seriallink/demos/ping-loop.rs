//! Ping a device once a second and print its diagnostic lines.
//!
//! Usage: `cargo run --example ping-loop -- /dev/ttyACM0 [baud]`

use std::sync::Arc;
use std::time::Duration;

use seriallink::link::{connect, InterfaceRegistry, WaitOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let port = args.next().ok_or("usage: ping-loop <port> [baud]")?;
    let baud = match args.next() {
        Some(baud) => baud.parse()?,
        None => 9600,
    };

    let registry = Arc::new(InterfaceRegistry::new());
    let link = connect(port, baud, registry)?;

    for seq in 1u32.. {
        // A 0x0A byte in the payload would end the reply line early.
        if seq.to_le_bytes().contains(&b'\n') {
            continue;
        }
        match link.ping(seq, WaitOptions::timeout(Duration::from_secs(1)))? {
            Some(reply) => println!("reply {reply}"),
            None => println!("no reply to ping {seq}"),
        }
        while let Some(line) = link.try_read_string() {
            println!("device: {line}");
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    Ok(())
}
