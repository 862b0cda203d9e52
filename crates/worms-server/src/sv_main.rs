// sv_main.rs -- server socket setup and the poll-driven main loop
//
// Single thread, one readiness wait per iteration. Idle eviction and the
// game tick are deadline values folded into the poll timeout; there are no
// per-session OS timers.

use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Instant;

use anyhow::Context as _;
use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};

use worms_common::protocol::MAX_CLIENT_MSG_SIZE;

use crate::server::{ClientKey, ServerConfig, ServerContext};
use crate::{sv_game, sv_send, sv_user};

const SERVER: Token = Token(0);
const EVENT_CAPACITY: usize = 64;

// ============================================================
// Socket setup
// ============================================================

/// Bind the dual-stack (IPv4-mapped) IPv6 UDP socket all player traffic
/// arrives on.
pub fn sv_setup_socket(port: u16) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .context("opening input socket")?;
    socket.set_only_v6(false).context("clearing IPV6_V6ONLY")?;
    socket.set_nonblocking(true).context("setting non-blocking mode")?;

    let addr = SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), port);
    socket
        .bind(&addr.into())
        .context("binding central socket")?;

    Ok(UdpSocket::from_std(socket.into()))
}

// ============================================================
// Idle eviction
// ============================================================

/// Evict every session whose idle deadline has passed. Iterates over a
/// snapshot of expired keys, then mutates the table. During an active round
/// the worm stays on the board and simply receives no further turn input.
pub fn sv_check_timeouts(ctx: &mut ServerContext, now: Instant) {
    let expired: Vec<ClientKey> = ctx
        .sessions
        .iter()
        .filter(|(_, s)| ctx.deadlines[s.timer_slot].is_some_and(|d| d <= now))
        .map(|(key, _)| key.clone())
        .collect();

    for key in expired {
        if let Some(session) = ctx.sessions.remove(&key) {
            ctx.deadlines[session.timer_slot] = None;
            ctx.free_slots.insert(session.timer_slot);
            if !session.player_name.is_empty() {
                ctx.used_names.remove(&session.player_name);
                ctx.game.ready.remove(&session.player_name);
                if !ctx.game.active {
                    ctx.game.worms.remove(&session.player_name);
                }
            }
            tracing::debug!(name = %session.player_name, slot = session.timer_slot, "session timed out");
        }
    }
}

// ============================================================
// Main loop
// ============================================================

/// Run the server forever: collect ready players, play a round, archive it,
/// repeat. Only OS-level failures return.
pub fn sv_run(config: ServerConfig) -> anyhow::Result<()> {
    let mut ctx = ServerContext::new(config);
    let mut poll = Poll::new().context("creating poll instance")?;
    let mut events = Events::with_capacity(EVENT_CAPACITY);
    let mut sock = sv_setup_socket(config.port)?;
    poll.registry()
        .register(&mut sock, SERVER, Interest::READABLE)
        .context("registering server socket")?;
    tracing::info!(port = config.port, rps = config.rps, "server listening");

    loop {
        ctx.new_round();
        while !sv_game::lobby_ready(&ctx) {
            sv_poll_once(&mut ctx, &mut poll, &mut events, &sock, None)?;
        }

        sv_game::start_game(&mut ctx);
        sv_send::broadcast_events(&sock, &ctx, 0);

        let mut next_tick = Instant::now() + ctx.config.tick_interval();
        while ctx.game.active {
            sv_poll_once(&mut ctx, &mut poll, &mut events, &sock, Some(&mut next_tick))?;
        }

        ctx.finish_round();
    }
}

/// One loop iteration: wait for readiness or the nearest deadline, evict
/// idlers, drain the socket, then run any due simulation ticks (catching up
/// with one step per elapsed interval).
fn sv_poll_once(
    ctx: &mut ServerContext,
    poll: &mut Poll,
    events: &mut Events,
    sock: &UdpSocket,
    tick: Option<&mut Instant>,
) -> anyhow::Result<()> {
    let now = Instant::now();
    let mut deadline = ctx.next_session_deadline();
    if let Some(next_tick) = tick.as_deref() {
        deadline = Some(deadline.map_or(*next_tick, |d| d.min(*next_tick)));
    }
    let timeout = deadline.map(|d| d.saturating_duration_since(now));

    if let Err(e) = poll.poll(events, timeout) {
        if e.kind() != io::ErrorKind::Interrupted {
            return Err(e).context("poll");
        }
        tracing::warn!("interrupted syscall");
    }

    let now = Instant::now();
    sv_check_timeouts(ctx, now);

    // Drain everything that arrived. One byte of headroom lets oversized
    // datagrams through to the parser, which rejects them.
    let mut buf = [0u8; MAX_CLIENT_MSG_SIZE + 1];
    loop {
        match sock.recv_from(&mut buf) {
            Ok((len, peer)) => {
                if let Some(from) = sv_user::sv_process_datagram(ctx, peer, &buf[..len], now) {
                    let (game_id, log) = ctx.reply_source();
                    sv_send::send_events(sock, peer, game_id, log, from);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    if let Some(next_tick) = tick {
        while ctx.game.active && *next_tick <= now {
            let from = ctx.game.events.next_event_no();
            sv_game::update_game(ctx);
            sv_send::broadcast_events(sock, ctx, from);
            *next_tick += ctx.config.tick_interval();
        }
    }

    Ok(())
}

// ============================================================
// Tests
// ============================================================
