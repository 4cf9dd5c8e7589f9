use std::thread;

use seriallink_link::{SerialLink, DEFAULT_POLL_DELAY};

use crate::cmd::{open_link, MonitorArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_line, print_packet, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let link = open_link(&args.port)?;
    let mut printed = 0usize;

    loop {
        let drained = drain(&link, &args, format, &mut printed);
        if args.count.is_some_and(|count| printed >= count) {
            return Ok(SUCCESS);
        }
        if !drained {
            thread::sleep(DEFAULT_POLL_DELAY);
        }
    }
}

/// Print what is buffered, stopping at the requested count. Returns false if
/// both buffers were empty.
fn drain(link: &SerialLink, args: &MonitorArgs, format: OutputFormat, printed: &mut usize) -> bool {
    let mut any = false;
    let limit = args.count.unwrap_or(usize::MAX);

    while *printed < limit {
        let line = if args.packets_only {
            None
        } else {
            link.try_read_string()
        };
        let packet = if args.lines_only || *printed + usize::from(line.is_some()) >= limit {
            None
        } else {
            link.try_read_packet()
        };

        if line.is_none() && packet.is_none() {
            break;
        }
        any = true;

        if let Some(line) = line {
            print_line(&line, link.port(), format);
            *printed += 1;
        }
        if let Some(packet) = packet {
            print_packet(&packet, link.port(), format);
            *printed += 1;
        }
    }

    any
}
