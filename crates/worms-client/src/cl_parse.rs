// cl_parse.rs -- ingest server datagrams into the game view
//
// Duplicate events are discarded silently; a bad CRC abandons the rest of
// the datagram; a CRC-valid record that violates the protocol kills the
// client.

use thiserror::Error;

use worms_common::event::{decode_event, Event, EventError};
use worms_common::protocol::{MAX_HEIGHT, MAX_WIDTH, MIN_HEIGHT, MIN_WIDTH};

use crate::client::GameView;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("server sent a malformed event: {0}")]
    BadEvent(#[from] EventError),
    #[error("NEW_GAME with event number {0}")]
    NewGameEventNo(u32),
    #[error("board dimensions out of range: {0}x{1}")]
    BadDimensions(u32, u32),
    #[error("unknown player order {0}")]
    UnknownPlayer(u8),
    #[error("pixel outside the board: ({0}, {1})")]
    PixelOutsideBoard(u32, u32),
}

/// Process one server datagram. A changed game id resets the view before
/// any event is looked at. Returns Err only on fatal protocol violations.
pub fn cl_ingest_datagram(view: &mut GameView, buf: &[u8]) -> Result<(), ProtocolError> {
    if buf.len() < 8 {
        return Ok(());
    }

    let game_id = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if game_id != view.game_id {
        tracing::debug!(game_id, "new game id, resetting view");
        view.reset(game_id);
    }

    let mut rest = &buf[4..];
    while !rest.is_empty() {
        match decode_event(rest) {
            // Truncated tail or corruption: the remainder is untrusted.
            Err(EventError::Truncated) | Err(EventError::BadCrc) => return Ok(()),
            Err(err @ EventError::Malformed(_)) => return Err(err.into()),
            Ok(frame) => {
                let consumed = frame.consumed;
                cl_accept_event(view, frame.event_no, frame.event)?;
                rest = &rest[consumed..];
            }
        }
    }
    Ok(())
}

fn cl_accept_event(
    view: &mut GameView,
    event_no: u32,
    event: Option<Event>,
) -> Result<(), ProtocolError> {
    // Unknown event types are well framed; step over them.
    let Some(event) = event else {
        return Ok(());
    };

    // A NEW_GAME anywhere but slot 0 is a protocol violation even when the
    // in-order check would discard it.
    if matches!(event, Event::NewGame { .. }) && event_no != 0 {
        return Err(ProtocolError::NewGameEventNo(event_no));
    }

    if event_no != view.next_expected_event_no || view.finished {
        return Ok(());
    }

    match event {
        Event::NewGame { maxx, maxy, players } => {
            if !(MIN_WIDTH..=MAX_WIDTH).contains(&maxx)
                || !(MIN_HEIGHT..=MAX_HEIGHT).contains(&maxy)
            {
                return Err(ProtocolError::BadDimensions(maxx, maxy));
            }
            let mut line = format!("NEW_GAME {maxx} {maxy}");
            for name in &players {
                line.push(' ');
                line.push_str(name);
            }
            line.push('\n');

            view.width = maxx;
            view.height = maxy;
            view.player_names = players;
            view.outbox.push(line);
            view.next_expected_event_no += 1;
        }
        Event::Pixel { player, x, y } => {
            let name = view
                .player_names
                .get(usize::from(player))
                .ok_or(ProtocolError::UnknownPlayer(player))?;
            if x >= view.width || y >= view.height {
                return Err(ProtocolError::PixelOutsideBoard(x, y));
            }
            view.outbox.push(format!("PIXEL {x} {y} {name}\n"));
            view.next_expected_event_no += 1;
        }
        Event::PlayerEliminated { player } => {
            let name = view
                .player_names
                .get(usize::from(player))
                .ok_or(ProtocolError::UnknownPlayer(player))?;
            view.outbox.push(format!("PLAYER_ELIMINATED {name}\n"));
            view.next_expected_event_no += 1;
        }
        // No GUI line, and the expected-event counter stays put; every
        // later event of this round is discarded via `finished`.
        Event::GameOver => view.finished = true,
    }
    Ok(())
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(game_id: u32, events: &[(u32, Event)]) -> Vec<u8> {
        let mut buf = game_id.to_be_bytes().to_vec();
        for (no, ev) in events {
            buf.extend_from_slice(&ev.encode(*no));
        }
        buf
    }

    fn pixel(x: u32, y: u32) -> Event {
        Event::Pixel { player: 0, x, y }
    }

    /// A view that already saw `NEW_GAME 800 600 alice bob` for game 7.
    fn running_view(next_expected: u32) -> GameView {
        GameView {
            game_id: 7,
            width: 800,
            height: 600,
            player_names: vec!["alice".into(), "bob".into()],
            next_expected_event_no: next_expected,
            ..GameView::default()
        }
    }

    // -------------------------------------------------------
    // Ordered ingestion & duplicate suppression
    // -------------------------------------------------------

    #[test]
    fn duplicates_are_suppressed_and_tail_accepted() {
        // next_expected = 5, datagram carries 3..=7: exactly 5, 6, 7 pass.
        let mut view = running_view(5);
        let events: Vec<(u32, Event)> = (3..=7).map(|no| (no, pixel(no, 1))).collect();
        cl_ingest_datagram(&mut view, &datagram(7, &events)).unwrap();

        assert_eq!(view.next_expected_event_no, 8);
        assert_eq!(
            view.outbox,
            vec!["PIXEL 5 1 alice\n", "PIXEL 6 1 alice\n", "PIXEL 7 1 alice\n"]
        );
    }

    #[test]
    fn out_of_order_event_is_discarded_silently() {
        let mut view = running_view(2);
        cl_ingest_datagram(&mut view, &datagram(7, &[(5, pixel(1, 1))])).unwrap();
        assert_eq!(view.next_expected_event_no, 2);
        assert!(view.outbox.is_empty());
    }

    #[test]
    fn bad_crc_stops_the_datagram_short() {
        let mut view = running_view(3);
        let mut buf = datagram(7, &[(3, pixel(10, 10)), (4, pixel(11, 10)), (5, pixel(12, 10))]);
        // Corrupt one payload byte of the middle record (22 bytes each).
        let middle_payload = 4 + 22 + 10;
        buf[middle_payload] ^= 0xFF;

        cl_ingest_datagram(&mut view, &buf).unwrap();
        assert_eq!(view.next_expected_event_no, 4, "only the first event landed");
        assert_eq!(view.outbox, vec!["PIXEL 10 10 alice\n"]);
    }

    // -------------------------------------------------------
    // Game-id reset
    // -------------------------------------------------------

    #[test]
    fn new_game_id_resets_even_a_finished_view() {
        let mut view = running_view(9);
        view.finished = true;

        let new_game = Event::NewGame {
            maxx: 640,
            maxy: 480,
            players: vec!["carol".into(), "dave".into()],
        };
        cl_ingest_datagram(&mut view, &datagram(8, &[(0, new_game)])).unwrap();

        assert_eq!(view.game_id, 8);
        assert!(!view.finished);
        assert_eq!(view.next_expected_event_no, 1);
        assert_eq!(view.player_names, vec!["carol", "dave"]);
        assert_eq!(view.outbox, vec!["NEW_GAME 640 480 carol dave\n"]);
    }

    #[test]
    fn same_game_id_does_not_reset() {
        let mut view = running_view(5);
        view.outbox.push("pending\n".into());
        cl_ingest_datagram(&mut view, &datagram(7, &[(5, pixel(1, 2))])).unwrap();
        assert_eq!(view.outbox.len(), 2, "pending line survived");
    }

    // -------------------------------------------------------
    // GAME_OVER
    // -------------------------------------------------------

    #[test]
    fn game_over_sets_finished_without_line_or_advance() {
        let mut view = running_view(4);
        cl_ingest_datagram(&mut view, &datagram(7, &[(4, Event::GameOver), (5, pixel(1, 1))]))
            .unwrap();

        assert!(view.finished);
        assert!(view.outbox.is_empty());
        assert_eq!(view.next_expected_event_no, 4);
    }

    #[test]
    fn events_after_finish_are_discarded() {
        let mut view = running_view(4);
        view.finished = true;
        cl_ingest_datagram(&mut view, &datagram(7, &[(4, pixel(1, 1))])).unwrap();
        assert!(view.outbox.is_empty());
        assert_eq!(view.next_expected_event_no, 4);
    }

    // -------------------------------------------------------
    // Fatal protocol violations
    // -------------------------------------------------------

    #[test]
    fn new_game_with_nonzero_event_no_is_fatal() {
        let mut view = running_view(3);
        let new_game = Event::NewGame {
            maxx: 800,
            maxy: 600,
            players: vec!["a".into(), "b".into()],
        };
        let got = cl_ingest_datagram(&mut view, &datagram(7, &[(3, new_game)]));
        assert_eq!(got, Err(ProtocolError::NewGameEventNo(3)));
    }

    #[test]
    fn new_game_with_bad_dimensions_is_fatal() {
        let mut view = GameView::default();
        let new_game = Event::NewGame {
            maxx: 8,
            maxy: 600,
            players: vec!["a".into(), "b".into()],
        };
        let got = cl_ingest_datagram(&mut view, &datagram(1, &[(0, new_game)]));
        assert_eq!(got, Err(ProtocolError::BadDimensions(8, 600)));
    }

    #[test]
    fn malformed_new_game_is_fatal() {
        let mut view = GameView::default();
        let new_game = Event::NewGame {
            maxx: 800,
            maxy: 600,
            players: vec!["b".into(), "a".into()], // not sorted
        };
        let got = cl_ingest_datagram(&mut view, &datagram(1, &[(0, new_game)]));
        assert!(matches!(got, Err(ProtocolError::BadEvent(_))));
    }

    #[test]
    fn accepted_pixel_for_unknown_player_is_fatal() {
        let mut view = running_view(3);
        let bad = Event::Pixel { player: 9, x: 1, y: 1 };
        let got = cl_ingest_datagram(&mut view, &datagram(7, &[(3, bad)]));
        assert_eq!(got, Err(ProtocolError::UnknownPlayer(9)));
    }

    #[test]
    fn accepted_pixel_off_board_is_fatal() {
        let mut view = running_view(3);
        let bad = Event::Pixel { player: 0, x: 800, y: 1 };
        let got = cl_ingest_datagram(&mut view, &datagram(7, &[(3, bad)]));
        assert_eq!(got, Err(ProtocolError::PixelOutsideBoard(800, 1)));
    }

    // -------------------------------------------------------
    // Lenient paths
    // -------------------------------------------------------

    #[test]
    fn short_datagram_is_ignored() {
        let mut view = running_view(3);
        cl_ingest_datagram(&mut view, &[1, 2, 3]).unwrap();
        assert_eq!(view.game_id, 7, "no reset either");
    }

    #[test]
    fn unknown_event_type_is_stepped_over() {
        use worms_common::crc::crc_block;

        let mut view = running_view(3);
        let mut buf = 7u32.to_be_bytes().to_vec();
        // Type 42 record with event number 3, then a normal pixel at 3.
        let mut record = Vec::new();
        let body = [0u8, 0, 0, 3, 42, 1, 2, 3];
        record.extend_from_slice(&(body.len() as u32).to_be_bytes());
        record.extend_from_slice(&body);
        let crc = crc_block(&record);
        record.extend_from_slice(&crc.to_be_bytes());
        buf.extend_from_slice(&record);
        buf.extend_from_slice(&pixel(4, 4).encode(3));

        cl_ingest_datagram(&mut view, &buf).unwrap();
        assert_eq!(view.outbox, vec!["PIXEL 4 4 alice\n"]);
        assert_eq!(view.next_expected_event_no, 4);
    }
}
