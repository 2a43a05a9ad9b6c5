//! Two communicators in one process trading a fixed number of messages.
//!
//! Run with:
//!   cargo run --example ping-pong
//!
//! The listening side answers every message with the same opcode plus one;
//! the connecting side sends the next message as each reply arrives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpccomm::communicator::{
    Bytes, CommError, Communicator, CommunicatorConfig, Context, Endpoint, ErrorKind, Handler,
    Meta,
};
use rpccomm::thread::{CountBarrier, ThreadPool};

const ROUNDS: u32 = 10;

struct Ponger;

impl Handler for Ponger {
    fn on_message_received(&mut self, ctx: &mut Context<'_>, meta: Meta, payload: Bytes) {
        eprintln!("pong <- opcode {} ({} bytes)", meta.opcode, payload.len());
        if let Err(err) = ctx.send_message(meta.opcode + 1, payload) {
            eprintln!("reply rejected: {err}");
            return;
        }
        // The final ping is the one answered with the last reply.
        if meta.opcode < 2 * (ROUNDS - 1) {
            let _ = ctx.recv_meta();
        }
    }

    fn on_error(&mut self, kind: ErrorKind, error: &CommError) {
        eprintln!("ponger {kind}: {error}");
    }
}

struct Pinger {
    done: Arc<CountBarrier>,
    replies: Arc<Mutex<u32>>,
}

impl Handler for Pinger {
    fn on_connected(&mut self, ctx: &mut Context<'_>) {
        let _ = ctx.send_message(0, "ping");
        let _ = ctx.recv_meta();
    }

    fn on_message_received(&mut self, ctx: &mut Context<'_>, meta: Meta, _payload: Bytes) {
        let mut replies = self.replies.lock().unwrap_or_else(|p| p.into_inner());
        *replies += 1;
        eprintln!("ping <- opcode {}", meta.opcode);
        if *replies == ROUNDS {
            self.done.signal();
            return;
        }
        let _ = ctx.send_message(meta.opcode + 1, "ping");
        let _ = ctx.recv_meta();
    }

    fn on_error(&mut self, kind: ErrorKind, error: &CommError) {
        eprintln!("pinger {kind}: {error}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = Communicator::listen(
        &Endpoint::loopback(0),
        Ponger,
        CommunicatorConfig::default(),
    )?;
    let endpoint = server
        .local_endpoint()
        .cloned()
        .ok_or("listener has no local endpoint")?;
    eprintln!("listening on {endpoint}");

    let done = Arc::new(CountBarrier::new(1));
    let replies = Arc::new(Mutex::new(0));
    let client = Communicator::connect(
        endpoint,
        Pinger {
            done: Arc::clone(&done),
            replies: Arc::clone(&replies),
        },
        CommunicatorConfig::default(),
    )?;

    let pool = ThreadPool::new(2)?;
    pool.push_task(move || {
        let mut server = server;
        server.run();
    })?;
    pool.push_task(move || {
        let mut client = client;
        client.run();
    })?;

    if !done.wait_timeout(Duration::from_secs(10)) {
        return Err("exchange timed out".into());
    }
    pool.wait();

    let replies = *replies.lock().unwrap_or_else(|p| p.into_inner());
    eprintln!("completed {replies} round trips");
    Ok(())
}
