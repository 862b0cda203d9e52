// sv_game.rs -- lobby readiness, round start and tick simulation

use worms_common::event::Event;
use worms_common::protocol::{TURN_LEFT, TURN_RIGHT};

use crate::server::{ServerContext, Worm};

// ============================================================
// Lobby
// ============================================================

/// A round starts once two or more distinct named players have reported a
/// non-zero turn intent since the last GAME_OVER.
pub fn lobby_ready(ctx: &ServerContext) -> bool {
    !ctx.game.active && ctx.game.ready.len() >= 2
}

// ============================================================
// Round start
// ============================================================

/// Draw the game id, announce NEW_GAME, spawn one worm per ready player in
/// ascending name order and emit its first PIXEL (or an immediate
/// PLAYER_ELIMINATED on a spawn collision). The round goes active only if
/// at least two worms survive spawning.
pub fn start_game(ctx: &mut ServerContext) {
    ctx.game.game_id = ctx.rng.next_rand() as u32;

    let players: Vec<String> = ctx.game.ready.iter().cloned().collect();
    ctx.game.events.push(&Event::NewGame {
        maxx: ctx.config.width,
        maxy: ctx.config.height,
        players: players.clone(),
    });

    for (i, name) in players.iter().enumerate() {
        let order = i as u8;
        let x = (ctx.rng.next_rand() % u64::from(ctx.config.width)) as f64 + 0.5;
        let y = (ctx.rng.next_rand() % u64::from(ctx.config.height)) as f64 + 0.5;
        let heading = (ctx.rng.next_rand() % 360) as i32;

        let turn_direction = ctx
            .used_names
            .get(name)
            .and_then(|key| ctx.sessions.get(key))
            .map(|session| session.turn_direction)
            .unwrap_or(0);

        let worm = Worm {
            x,
            y,
            heading,
            turn_direction,
            order,
        };

        // Spawn points are always inside the board, so the cell fits u32.
        let (cx, cy) = worm.cell();
        let cell = (cx as u32, cy as u32);
        if ctx.game.eaten.contains(&cell) {
            ctx.game.events.push(&Event::PlayerEliminated { player: order });
        } else {
            ctx.game.events.push(&Event::Pixel {
                player: order,
                x: cell.0,
                y: cell.1,
            });
            ctx.game.eaten.insert(cell);
            ctx.game.worms.insert(name.clone(), worm);
        }
    }

    if ctx.game.worms.len() >= 2 {
        ctx.game.active = true;
        tracing::info!(game_id = ctx.game.game_id, players = players.len(), "round started");
    } else {
        ctx.game.events.push(&Event::GameOver);
        ctx.game.active = false;
        tracing::info!(game_id = ctx.game.game_id, "round over at spawn");
    }
}

// ============================================================
// Tick simulation
// ============================================================

/// One integration step. Worms are visited in the sorted name order fixed at
/// round start; eliminations are applied after the sweep. When one worm or
/// fewer remains, GAME_OVER ends the round.
pub fn update_game(ctx: &mut ServerContext) {
    let turning_speed = ctx.config.turning_speed as i32;
    let width = i64::from(ctx.config.width);
    let height = i64::from(ctx.config.height);

    let game = &mut ctx.game;
    let mut eliminated: Vec<String> = Vec::new();

    for (name, worm) in game.worms.iter_mut() {
        match worm.turn_direction {
            TURN_RIGHT => worm.heading = (worm.heading + turning_speed).rem_euclid(360),
            TURN_LEFT => worm.heading = (worm.heading - turning_speed).rem_euclid(360),
            _ => {}
        }

        let before = worm.cell();
        let radians = f64::from(worm.heading).to_radians();
        worm.x += radians.cos();
        worm.y += radians.sin();

        let (cx, cy) = worm.cell();
        if (cx, cy) == before {
            continue;
        }

        let off_board = cx < 0 || cy < 0 || cx >= width || cy >= height;
        if off_board || game.eaten.contains(&(cx as u32, cy as u32)) {
            game.events.push(&Event::PlayerEliminated { player: worm.order });
            eliminated.push(name.clone());
        } else {
            game.events.push(&Event::Pixel {
                player: worm.order,
                x: cx as u32,
                y: cy as u32,
            });
            game.eaten.insert((cx as u32, cy as u32));
        }
    }

    for name in &eliminated {
        game.worms.remove(name);
    }

    if game.worms.len() <= 1 {
        game.events.push(&Event::GameOver);
        game.active = false;
        tracing::info!(game_id = game.game_id, "round finished");
    }
}

// ============================================================
// Tests
// ============================================================
