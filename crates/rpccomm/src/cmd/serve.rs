use rpccomm_communicator::{
    Bytes, CommError, Communicator, Context, ErrorKind, Handler, Meta, StopHandle,
};
use tracing::{info, warn};

use crate::cmd::{communicator_config, parse_endpoint, peer_label, ServeArgs};
use crate::exit::{comm_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

struct EchoHandler {
    format: OutputFormat,
    count: Option<usize>,
    reply_opcode: Option<u32>,
    echoed: usize,
    failure: Option<CliError>,
    // Set when a callback stopped the loop after recording `failure`.
    stopped_itself: bool,
}

impl EchoHandler {
    fn limit_reached(&self) -> bool {
        self.count.is_some_and(|count| self.echoed >= count)
    }

    fn abort(&mut self, ctx: &mut Context<'_>, failure: CliError) {
        self.failure = Some(failure);
        self.stopped_itself = true;
        ctx.stop();
    }
}

impl Handler for EchoHandler {
    fn on_connected(&mut self, ctx: &mut Context<'_>) {
        info!(peer = %peer_label(ctx.peer_endpoint()), "peer connected");
    }

    fn on_message_received(&mut self, ctx: &mut Context<'_>, meta: Meta, payload: Bytes) {
        print_message(&meta, &payload, &peer_label(ctx.peer_endpoint()), self.format);
        self.echoed = self.echoed.saturating_add(1);

        let opcode = self.reply_opcode.unwrap_or(meta.opcode);
        if let Err(err) = ctx.send_message(opcode, payload) {
            self.abort(ctx, comm_error("echo failed", &err));
        }
    }

    // One echo in flight at a time: the next request is read once this one is written.
    fn on_send_complete(&mut self, ctx: &mut Context<'_>) {
        if self.limit_reached() {
            return;
        }
        if let Err(err) = ctx.recv_meta() {
            self.abort(ctx, comm_error("receive failed", &err));
        }
    }

    fn on_error(&mut self, kind: ErrorKind, error: &CommError) {
        if error.is_disconnect() {
            info!("peer disconnected");
            return;
        }
        let context = match kind {
            ErrorKind::AcceptFailure => "accept failed",
            ErrorKind::WriteFailure => "echo failed",
            _ => "receive failed",
        };
        self.failure = Some(comm_error(context, error));
    }
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }
    let endpoint = parse_endpoint(&args.endpoint)?;
    let handler = EchoHandler {
        format,
        count: args.count,
        reply_opcode: args.reply_opcode,
        echoed: 0,
        failure: None,
        stopped_itself: false,
    };
    let mut comm = Communicator::listen(&endpoint, handler, communicator_config(args.max_payload))
        .map_err(|err| comm_error("bind failed", &err))?;

    let stop = comm.stop_handle();
    install_ctrlc_handler(stop.clone())?;
    comm.run();

    let handler = comm.into_handler();
    if stop.is_stopped() && !handler.stopped_itself {
        info!("interrupted");
        return Ok(SUCCESS);
    }
    match handler.failure {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        warn!("stop requested");
        stop.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
