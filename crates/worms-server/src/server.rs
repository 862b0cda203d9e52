// server.rs -- core server types and constants

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use worms_common::event::Event;
use worms_common::protocol::{DEFAULT_HEIGHT, DEFAULT_SERVER_PORT, DEFAULT_WIDTH, MAX_PLAYERS};
use worms_common::rng::Rng;

// ============================================================
// Constants
// ============================================================

pub const MIN_TURNING_SPEED: u32 = 1;
pub const DEFAULT_TURNING_SPEED: u32 = 6;
pub const MAX_TURNING_SPEED: u32 = 90;

pub const MIN_RPS: u32 = 1;
pub const DEFAULT_RPS: u32 = 50;
pub const MAX_RPS: u32 = 250;

/// A session that stays silent this long is evicted.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================
// ServerConfig
// ============================================================

/// Built once at startup from the command line; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub seed: u32,
    pub turning_speed: u32,
    pub rps: u32,
    pub port: u16,
    pub width: u32,
    pub height: u32,
}

impl ServerConfig {
    /// Stock defaults with an explicit seed.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            turning_speed: DEFAULT_TURNING_SPEED,
            rps: DEFAULT_RPS,
            port: DEFAULT_SERVER_PORT,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.rps))
    }
}

// ============================================================
// ClientKey -- peer endpoint identity
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AddrFamily {
    V4,
    V6,
}

/// Identifies a peer endpoint. Field order gives the lexicographic
/// (family, port, ip) ordering used by the session table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClientKey {
    pub family: AddrFamily,
    pub port: u16,
    pub ip: String,
}

impl From<SocketAddr> for ClientKey {
    fn from(addr: SocketAddr) -> Self {
        Self {
            family: match addr {
                SocketAddr::V4(_) => AddrFamily::V4,
                SocketAddr::V6(_) => AddrFamily::V6,
            },
            port: addr.port(),
            ip: addr.ip().to_string(),
        }
    }
}

// ============================================================
// Session
// ============================================================

/// One tracked client endpoint. Created on the first valid datagram,
/// destroyed on idle timeout or replaced on a session-id reset.
#[derive(Debug, Clone)]
pub struct Session {
    /// Idle-timer slot, 1..=MAX_PLAYERS.
    pub timer_slot: usize,
    pub session_id: u64,
    /// Empty for observers.
    pub player_name: String,
    /// Reply address as the datagram arrived; kept alongside the key so
    /// fan-out needs no reverse parsing.
    pub addr: SocketAddr,
    /// Last reported turn intent.
    pub turn_direction: u8,
}

// ============================================================
// Worm
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Worm {
    pub x: f64,
    pub y: f64,
    /// Integer degrees, 0..=359.
    pub heading: i32,
    pub turn_direction: u8,
    pub order: u8,
}

impl Worm {
    /// The observable cell: only floored coordinates reach the wire.
    pub fn cell(&self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }
}

// ============================================================
// EventLog
// ============================================================

/// Per-round ordered event records. Event numbers are assigned densely by
/// insertion order, so the wire form is frozen at append time.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<Vec<u8>>,
}

impl EventLog {
    /// The next event number, i.e. the count of stored events.
    pub fn next_event_no(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn push(&mut self, event: &Event) {
        let record = event.encode(self.next_event_no());
        self.records.push(record);
    }

    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }
}

// ============================================================
// Round
// ============================================================

/// State of the current round, plus the lobby bookkeeping that decides when
/// the next one starts.
#[derive(Debug, Default)]
pub struct Round {
    pub active: bool,
    pub game_id: u32,
    pub events: EventLog,
    /// A pixel is here iff a PIXEL event for it is in `events`.
    pub eaten: HashSet<(u32, u32)>,
    /// Keyed by player name; iteration order is the sorted name order that
    /// fixed `order` at round start.
    pub worms: BTreeMap<String, Worm>,
    /// Named players that pressed a key since the last GAME_OVER.
    pub ready: BTreeSet<String>,
}

/// Event log of the last completed round, kept only to answer late
/// next-event queries between rounds.
#[derive(Debug, Default)]
pub struct PrevRound {
    pub game_id: u32,
    pub events: EventLog,
}

// ============================================================
// ServerContext
// ============================================================

pub struct ServerContext {
    pub config: ServerConfig,
    pub rng: Rng,

    /// Owning session table, keyed by endpoint.
    pub sessions: BTreeMap<ClientKey, Session>,
    /// Name index; non-empty names are unique across sessions.
    pub used_names: HashMap<String, ClientKey>,
    /// Unassigned idle-timer slots.
    pub free_slots: BTreeSet<usize>,
    /// Idle deadline per slot; index 0 unused.
    pub deadlines: Vec<Option<Instant>>,

    pub game: Round,
    pub prev: PrevRound,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rng: Rng::from_seed(config.seed),
            sessions: BTreeMap::new(),
            used_names: HashMap::new(),
            free_slots: (1..=MAX_PLAYERS).collect(),
            deadlines: vec![None; MAX_PLAYERS + 1],
            game: Round::default(),
            prev: PrevRound::default(),
        }
    }

    /// The nearest idle deadline, for the poll timeout.
    pub fn next_session_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Where replies to client reports are served from: the current round
    /// while one is running, the previous one otherwise.
    pub fn reply_source(&self) -> (u32, &EventLog) {
        if self.game.active {
            (self.game.game_id, &self.game.events)
        } else {
            (self.prev.game_id, &self.prev.events)
        }
    }

    /// Reset per-round state; lobby starts collecting ready players anew.
    pub fn new_round(&mut self) {
        self.game = Round::default();
    }

    /// Archive the finished round for late queries.
    pub fn finish_round(&mut self) {
        self.prev.game_id = self.game.game_id;
        self.prev.events = std::mem::take(&mut self.game.events);
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------
    // ClientKey ordering
    // -------------------------------------------------------

    fn v4(ip: &str, port: u16) -> ClientKey {
        ClientKey {
            family: AddrFamily::V4,
            port,
            ip: ip.into(),
        }
    }

    #[test]
    fn key_orders_family_then_port_then_ip() {
        let a = v4("10.0.0.2", 1000);
        let b = v4("10.0.0.1", 2000);
        assert!(a < b, "port dominates ip");

        let c = ClientKey {
            family: AddrFamily::V6,
            port: 1,
            ip: "::1".into(),
        };
        assert!(b < c, "family dominates port");

        let d = v4("10.0.0.3", 1000);
        assert!(a < d, "ip breaks port ties");
    }

    #[test]
    fn key_from_socket_addr() {
        let addr: SocketAddr = "192.168.1.5:4242".parse().unwrap();
        let key = ClientKey::from(addr);
        assert_eq!(key, v4("192.168.1.5", 4242));
    }

    // -------------------------------------------------------
    // EventLog numbering
    // -------------------------------------------------------

    #[test]
    fn event_numbers_are_dense_from_zero() {
        let mut log = EventLog::default();
        assert_eq!(log.next_event_no(), 0);
        log.push(&Event::GameOver);
        log.push(&Event::PlayerEliminated { player: 0 });
        assert_eq!(log.next_event_no(), 2);

        for (i, record) in log.records().iter().enumerate() {
            let frame = worms_common::event::decode_event(record).unwrap();
            assert_eq!(frame.event_no, i as u32);
        }
    }

    // -------------------------------------------------------
    // Context basics
    // -------------------------------------------------------

    #[test]
    fn context_starts_with_all_slots_free() {
        let ctx = ServerContext::new(ServerConfig::with_seed(1));
        assert_eq!(ctx.free_slots.len(), MAX_PLAYERS);
        assert_eq!(ctx.next_session_deadline(), None);
        assert!(!ctx.game.active);
    }

    #[test]
    fn finish_round_archives_the_log() {
        let mut ctx = ServerContext::new(ServerConfig::with_seed(1));
        ctx.game.game_id = 99;
        ctx.game.events.push(&Event::GameOver);
        ctx.finish_round();
        ctx.new_round();

        let (gid, log) = ctx.reply_source();
        assert_eq!(gid, 99);
        assert_eq!(log.next_event_no(), 1);
    }

    #[test]
    fn tick_interval_matches_rps() {
        let mut config = ServerConfig::with_seed(0);
        config.rps = 250;
        assert_eq!(config.tick_interval(), Duration::from_millis(4));
        config.rps = 1;
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }
}
