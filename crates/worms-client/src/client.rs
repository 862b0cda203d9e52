// client.rs -- core client types

use std::time::Duration;

use worms_common::protocol::{ClientMsg, TURN_STRAIGHT};

/// How often the move reporter fires.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(30);

// ============================================================
// ClientConfig
// ============================================================

/// Built once at startup; immutable afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
    pub gui_host: String,
    pub gui_port: u16,
    /// Empty for an observer.
    pub player_name: String,
    /// Microseconds since the epoch at startup.
    pub session_id: u64,
}

// ============================================================
// GameView
// ============================================================

/// Everything the client knows about the round it is following, plus the
/// GUI lines not yet written out.
#[derive(Debug, Default)]
pub struct GameView {
    pub game_id: u32,
    pub width: u32,
    pub height: u32,
    /// Indexed by player order, as announced by NEW_GAME.
    pub player_names: Vec<String>,
    pub next_expected_event_no: u32,
    pub finished: bool,
    pub turn_direction: u8,
    /// Rendered GUI lines awaiting delivery.
    pub outbox: Vec<String>,
}

impl GameView {
    /// A datagram for an unknown game id wipes the whole view, pending GUI
    /// lines included.
    pub fn reset(&mut self, game_id: u32) {
        *self = GameView {
            game_id,
            turn_direction: TURN_STRAIGHT,
            ..GameView::default()
        };
    }

    /// The move report sent to the server every cycle.
    pub fn report(&self, config: &ClientConfig) -> ClientMsg {
        ClientMsg {
            session_id: config.session_id,
            turn_direction: self.turn_direction,
            next_event_no: self.next_expected_event_no,
            player_name: config.player_name.clone(),
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use worms_common::protocol::TURN_LEFT;

    #[test]
    fn reset_clears_everything_but_the_new_game_id() {
        let mut view = GameView {
            game_id: 7,
            width: 800,
            height: 600,
            player_names: vec!["a".into()],
            next_expected_event_no: 12,
            finished: true,
            turn_direction: TURN_LEFT,
            outbox: vec!["PIXEL 1 2 a\n".into()],
        };
        view.reset(8);

        assert_eq!(view.game_id, 8);
        assert_eq!(view.width, 0);
        assert!(view.player_names.is_empty());
        assert_eq!(view.next_expected_event_no, 0);
        assert!(!view.finished);
        assert_eq!(view.turn_direction, TURN_STRAIGHT);
        assert!(view.outbox.is_empty());
    }

    #[test]
    fn report_carries_view_and_config_state() {
        let config = ClientConfig {
            server_host: "localhost".into(),
            server_port: 2021,
            gui_host: "localhost".into(),
            gui_port: 20210,
            player_name: "alice".into(),
            session_id: 123,
        };
        let view = GameView {
            turn_direction: TURN_LEFT,
            next_expected_event_no: 9,
            ..GameView::default()
        };

        let msg = view.report(&config);
        assert_eq!(msg.session_id, 123);
        assert_eq!(msg.turn_direction, TURN_LEFT);
        assert_eq!(msg.next_event_no, 9);
        assert_eq!(msg.player_name, "alice");
    }
}
