use seriallink_link::WaitOptions;

use crate::cmd::{open_link, parse_duration, SendArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_packet, print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let link = open_link(&args.port)?;

    let written = link
        .write_packet(args.id, &payload)
        .map_err(|err| link_error("send failed", err))?;
    if !written {
        return Err(CliError::new(
            TIMEOUT,
            format!("write to {} timed out; link was reset and the packet dropped", link.port()),
        ));
    }
    print_sent(args.id, payload.len(), link.port(), format);

    if let Some(wait_id) = args.wait {
        let packet = link
            .wait_for_packet(wait_id, WaitOptions::timeout(wait_timeout))
            .map_err(|err| link_error("receive failed", err))?
            .ok_or_else(|| {
                CliError::new(
                    TIMEOUT,
                    format!("no packet {wait_id} within {}", args.wait_timeout),
                )
            })?;
        print_packet(&packet, link.port(), format);
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("--hex is not valid hex: {input}")))
        })
        .collect()
}
