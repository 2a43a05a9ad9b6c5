use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rpccomm_communicator::{
    Bytes, CommError, Communicator, Context, ErrorKind, Handler, Meta, StopHandle,
};
use tracing::debug;

use crate::cmd::{communicator_config, parse_endpoint, peer_label, SendArgs};
use crate::exit::{comm_error, io_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

struct SendHandler {
    opcode: u32,
    payload: Option<Bytes>,
    wait: bool,
    format: OutputFormat,
    replied: bool,
    failure: Option<CliError>,
}

impl Handler for SendHandler {
    fn on_connected(&mut self, ctx: &mut Context<'_>) {
        let payload = self.payload.take().unwrap_or_default();
        if let Err(err) = ctx.send_message(self.opcode, payload) {
            self.failure = Some(comm_error("send failed", &err));
            return;
        }
        if self.wait {
            if let Err(err) = ctx.recv_meta() {
                self.failure = Some(comm_error("receive failed", &err));
            }
        }
    }

    fn on_message_received(&mut self, ctx: &mut Context<'_>, meta: Meta, payload: Bytes) {
        print_message(&meta, &payload, &peer_label(ctx.peer_endpoint()), self.format);
        self.replied = true;
    }

    fn on_send_complete(&mut self, _ctx: &mut Context<'_>) {
        debug!(opcode = self.opcode, "message sent");
    }

    fn on_error(&mut self, kind: ErrorKind, error: &CommError) {
        let context = match kind {
            ErrorKind::ConnectFailure => "connect failed",
            ErrorKind::WriteFailure => "send failed",
            _ => "receive failed",
        };
        self.failure = Some(comm_error(context, error));
    }
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let endpoint = parse_endpoint(&args.endpoint)?;
    let payload = resolve_payload(&args)?;

    let handler = SendHandler {
        opcode: args.opcode,
        payload: Some(payload),
        wait: args.wait,
        format,
        replied: false,
        failure: None,
    };
    let mut comm = Communicator::connect(endpoint, handler, communicator_config(args.max_payload))
        .map_err(|err| comm_error("connect failed", &err))?;

    let stop = comm.stop_handle();
    let timer = args.wait.then(|| spawn_timeout(stop.clone(), wait_timeout));
    comm.run();
    if let Some((cancel, handle)) = timer {
        drop(cancel);
        let _ = handle.join();
    }

    let handler = comm.into_handler();
    if args.wait && !handler.replied && stop.is_stopped() {
        return Err(CliError::new(
            TIMEOUT,
            format!("no reply within {}", args.wait_timeout),
        ));
    }
    match handler.failure {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

/// Stop the communicator unless the returned sender is dropped first.
fn spawn_timeout(
    stop: StopHandle,
    timeout: Duration,
) -> (mpsc::Sender<()>, thread::JoinHandle<()>) {
    let (cancel, cancelled) = mpsc::channel::<()>();
    let handle = thread::spawn(move || {
        if let Err(mpsc::RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
            debug!(?timeout, "reply timed out");
            stop.stop();
        }
    });
    (cancel, handle)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Bytes> {
    if let Some(data) = &args.data {
        return Ok(Bytes::from(data.clone()));
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map(Bytes::from)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), &err));
    }
    Ok(Bytes::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
