// sv_user.rs -- inbound client reports: parsing, admission, session upkeep
//
// One datagram in, at most one session-table transition out. The caller
// replies by fanning out events from the returned next-event number.

use std::net::SocketAddr;
use std::time::Instant;

use worms_common::protocol::{ClientMsg, MAX_PLAYERS};

use crate::server::{ClientKey, ServerContext, Session, CLIENT_TIMEOUT};

/// Handle one inbound datagram. Returns the client's declared next expected
/// event number when the datagram was accepted and deserves a reply, None
/// when it was dropped (malformed, stale, refused).
pub fn sv_process_datagram(
    ctx: &mut ServerContext,
    peer: SocketAddr,
    buf: &[u8],
    now: Instant,
) -> Option<u32> {
    let msg = ClientMsg::parse(buf)?;
    let key = ClientKey::from(peer);

    let existing = ctx
        .sessions
        .get(&key)
        .map(|s| (s.session_id, s.timer_slot, s.player_name.clone()));

    match existing {
        None => {
            if ctx.sessions.len() >= MAX_PLAYERS {
                return None;
            }
            if !msg.player_name.is_empty() && ctx.used_names.contains_key(&msg.player_name) {
                return None;
            }

            let slot = ctx.free_slots.pop_first()?;
            ctx.deadlines[slot] = Some(now + CLIENT_TIMEOUT);
            if !msg.player_name.is_empty() {
                ctx.used_names.insert(msg.player_name.clone(), key.clone());
            }
            tracing::debug!(%peer, name = %msg.player_name, slot, "session admitted");
            ctx.sessions.insert(
                key.clone(),
                Session {
                    timer_slot: slot,
                    session_id: msg.session_id,
                    player_name: msg.player_name.clone(),
                    addr: peer,
                    turn_direction: 0,
                },
            );
        }
        Some((stored_id, slot, old_name)) => {
            if msg.session_id < stored_id {
                return None;
            }
            if msg.session_id > stored_id {
                // Same endpoint, fresh session: replace the record but keep
                // the timer slot. The old name is freed; the new one is
                // adopted without a collision re-check.
                if !old_name.is_empty() {
                    ctx.used_names.remove(&old_name);
                    if old_name != msg.player_name {
                        ctx.game.ready.remove(&old_name);
                    }
                }
                if !msg.player_name.is_empty() {
                    ctx.used_names.insert(msg.player_name.clone(), key.clone());
                }
                tracing::debug!(%peer, name = %msg.player_name, "session replaced");
                ctx.sessions.insert(
                    key.clone(),
                    Session {
                        timer_slot: slot,
                        session_id: msg.session_id,
                        player_name: msg.player_name.clone(),
                        addr: peer,
                        turn_direction: 0,
                    },
                );
            }
            ctx.deadlines[slot] = Some(now + CLIENT_TIMEOUT);
        }
    }

    // Record the turn intent; named players become ready in the lobby and
    // steer their worm during a round.
    if let Some(session) = ctx.sessions.get_mut(&key) {
        session.turn_direction = msg.turn_direction;
        if !session.player_name.is_empty() {
            let name = session.player_name.clone();
            if !ctx.game.active && msg.turn_direction != 0 {
                ctx.game.ready.insert(name.clone());
            }
            if let Some(worm) = ctx.game.worms.get_mut(&name) {
                worm.turn_direction = msg.turn_direction;
            }
        }
    }

    Some(msg.next_event_no)
}

// ============================================================
// Tests
// ============================================================
