// sv_send.rs -- event fan-out and datagram batching

use std::net::SocketAddr;

use mio::net::UdpSocket;
use worms_common::protocol::MAX_DGRAM_SIZE;

use crate::server::{EventLog, ServerContext};

// ============================================================
// Batching
// ============================================================

/// Pack events `from..` into datagrams. Every datagram starts with the
/// game id; an event that would push the datagram past MAX_DGRAM_SIZE
/// flushes first and opens a new one.
pub fn build_datagrams(game_id: u32, events: &EventLog, from: u32) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut dgram = game_id.to_be_bytes().to_vec();

    for record in events.records().iter().skip(from as usize) {
        if dgram.len() + record.len() > MAX_DGRAM_SIZE && dgram.len() > 4 {
            out.push(std::mem::replace(&mut dgram, game_id.to_be_bytes().to_vec()));
        }
        dgram.extend_from_slice(record);
    }

    if dgram.len() > 4 {
        out.push(dgram);
    }
    out
}

// ============================================================
// Sending
// ============================================================

/// Send events `from..` to one client. A failed send silently drops the
/// rest; there is no per-client back-pressure state.
pub fn send_events(
    sock: &UdpSocket,
    addr: SocketAddr,
    game_id: u32,
    events: &EventLog,
    from: u32,
) {
    for dgram in build_datagrams(game_id, events, from) {
        if sock.send_to(&dgram, addr).is_err() {
            return;
        }
    }
}

/// Fan new events of the current round out to every tracked session.
pub fn broadcast_events(sock: &UdpSocket, ctx: &ServerContext, from: u32) {
    for session in ctx.sessions.values() {
        send_events(sock, session.addr, ctx.game.game_id, &ctx.game.events, from);
    }
}

// ============================================================
// Tests
// ============================================================
