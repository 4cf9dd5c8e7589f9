use std::time::Instant;

use seriallink_link::WaitOptions;

use crate::cmd::{open_link, parse_duration, PingArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_ping, OutputFormat};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let link = open_link(&args.port)?;

    let started = Instant::now();
    let reply = link
        .ping(args.seq, WaitOptions::timeout(timeout))
        .map_err(|err| link_error("ping failed", err))?;

    match reply {
        Some(_) => {
            print_ping(args.seq, started.elapsed(), link.port(), format);
            Ok(SUCCESS)
        }
        None => Err(CliError::new(
            TIMEOUT,
            format!("no ping reply from {} within {}", link.port(), args.timeout),
        )),
    }
}
