// event.rs -- server->client wire events
//
// Each event travels as:
//
//     len:u32  event_no:u32  event_type:u8  data...  crc32:u32
//
// where len counts (event_no || event_type || data) and the CRC covers
// everything *including* the len prefix. A datagram is game_id:u32 followed
// by a run of these records.

use thiserror::Error;

use crate::crc::crc_block;
use crate::msg::{msg_write_byte, msg_write_long, msg_write_string, MsgReader};
use crate::protocol::{is_valid_name, MAX_PLAYERS};

// ============================================================
// Event types
// ============================================================

pub const NEW_GAME_EVENT: u8 = 0;
pub const PIXEL_EVENT: u8 = 1;
pub const PLAYER_ELIMINATED_EVENT: u8 = 2;
pub const GAME_OVER_EVENT: u8 = 3;

/// Smallest possible record: len + event_no + type + crc.
pub const MIN_EVENT_SIZE: usize = 13;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NewGame {
        maxx: u32,
        maxy: u32,
        players: Vec<String>,
    },
    Pixel {
        player: u8,
        x: u32,
        y: u32,
    },
    PlayerEliminated {
        player: u8,
    },
    GameOver,
}

// ============================================================
// Encoding
// ============================================================

impl Event {
    fn write_data(&self, buf: &mut Vec<u8>) {
        match self {
            Event::NewGame { maxx, maxy, players } => {
                msg_write_long(buf, *maxx);
                msg_write_long(buf, *maxy);
                for name in players {
                    msg_write_string(buf, name);
                    msg_write_byte(buf, 0);
                }
            }
            Event::Pixel { player, x, y } => {
                msg_write_byte(buf, *player);
                msg_write_long(buf, *x);
                msg_write_long(buf, *y);
            }
            Event::PlayerEliminated { player } => {
                msg_write_byte(buf, *player);
            }
            Event::GameOver => {}
        }
    }

    fn type_byte(&self) -> u8 {
        match self {
            Event::NewGame { .. } => NEW_GAME_EVENT,
            Event::Pixel { .. } => PIXEL_EVENT,
            Event::PlayerEliminated { .. } => PLAYER_ELIMINATED_EVENT,
            Event::GameOver => GAME_OVER_EVENT,
        }
    }

    /// Serialize the full wire record for this event.
    pub fn encode(&self, event_no: u32) -> Vec<u8> {
        let mut body = Vec::new();
        msg_write_long(&mut body, event_no);
        msg_write_byte(&mut body, self.type_byte());
        self.write_data(&mut body);

        let mut record = Vec::with_capacity(body.len() + 8);
        msg_write_long(&mut record, body.len() as u32);
        record.extend_from_slice(&body);
        let crc = crc_block(&record);
        msg_write_long(&mut record, crc);
        record
    }
}

// ============================================================
// Decoding
// ============================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// Not enough bytes for a full record; stop parsing the datagram.
    #[error("truncated event record")]
    Truncated,
    /// Checksum mismatch; the rest of the datagram is untrusted.
    #[error("event checksum mismatch")]
    BadCrc,
    /// The checksum verified but the body violates the protocol.
    #[error("malformed event: {0}")]
    Malformed(&'static str),
}

/// A successfully framed record.
#[derive(Debug, PartialEq, Eq)]
pub struct EventFrame {
    pub event_no: u32,
    /// None for event types this client does not know; the record is still
    /// well framed and should be stepped over.
    pub event: Option<Event>,
    /// Total wire bytes of the record, including len prefix and CRC.
    pub consumed: usize,
}

/// Decode one record from the front of `buf`.
pub fn decode_event(buf: &[u8]) -> Result<EventFrame, EventError> {
    if buf.len() < MIN_EVENT_SIZE {
        return Err(EventError::Truncated);
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let total = 4 + len + 4;
    if total > buf.len() {
        return Err(EventError::Truncated);
    }

    let wire_crc = u32::from_be_bytes([
        buf[4 + len],
        buf[5 + len],
        buf[6 + len],
        buf[7 + len],
    ]);
    if crc_block(&buf[..4 + len]) != wire_crc {
        return Err(EventError::BadCrc);
    }

    if len < 5 {
        return Err(EventError::Malformed("body shorter than header"));
    }

    let mut r = MsgReader::new(&buf[4..4 + len]);
    let event_no = r.read_long().expect("length checked above");
    let event_type = r.read_byte().expect("length checked above");
    let data = r.read_rest();

    let event = match event_type {
        NEW_GAME_EVENT => Some(decode_new_game(data)?),
        PIXEL_EVENT => {
            if data.len() != 9 {
                return Err(EventError::Malformed("bad PIXEL size"));
            }
            let mut d = MsgReader::new(data);
            Some(Event::Pixel {
                player: d.read_byte().expect("size checked"),
                x: d.read_long().expect("size checked"),
                y: d.read_long().expect("size checked"),
            })
        }
        PLAYER_ELIMINATED_EVENT => {
            if data.len() != 1 {
                return Err(EventError::Malformed("bad PLAYER_ELIMINATED size"));
            }
            Some(Event::PlayerEliminated { player: data[0] })
        }
        GAME_OVER_EVENT => {
            if !data.is_empty() {
                return Err(EventError::Malformed("bad GAME_OVER size"));
            }
            Some(Event::GameOver)
        }
        _ => None,
    };

    Ok(EventFrame {
        event_no,
        event,
        consumed: total,
    })
}

fn decode_new_game(data: &[u8]) -> Result<Event, EventError> {
    if data.len() < 8 {
        return Err(EventError::Malformed("NEW_GAME shorter than dimensions"));
    }
    let mut d = MsgReader::new(data);
    let maxx = d.read_long().expect("size checked");
    let maxy = d.read_long().expect("size checked");

    let mut players = Vec::new();
    let names = d.read_rest();
    if names.last() != Some(&0) {
        return Err(EventError::Malformed("NEW_GAME name list not NUL-terminated"));
    }
    for name in names.split(|&b| b == 0) {
        if name.is_empty() {
            // Either the tail of the final terminator or an empty name
            // between two NULs; the byte-count guard below rejects the
            // latter.
            continue;
        }
        if !is_valid_name(name) {
            return Err(EventError::Malformed("NEW_GAME bad player name"));
        }
        players.push(String::from_utf8(name.to_vec()).expect("validated ASCII"));
    }

    // split() hides empty segments between consecutive NULs; catch them by
    // comparing byte counts: every name plus one NUL each.
    let expected_bytes: usize = players.iter().map(|p| p.len() + 1).sum();
    if expected_bytes != names.len() {
        return Err(EventError::Malformed("NEW_GAME empty player name"));
    }

    if players.len() < 2 || players.len() > MAX_PLAYERS {
        return Err(EventError::Malformed("NEW_GAME bad player count"));
    }
    if !players.windows(2).all(|w| w[0] < w[1]) {
        return Err(EventError::Malformed("NEW_GAME names not strictly sorted"));
    }

    Ok(Event::NewGame { maxx, maxy, players })
}

// ============================================================
// Tests
// ============================================================
