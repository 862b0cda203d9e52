// cl_main.rs -- client event loop: server UDP, GUI TCP, 30 ms reporter
//
// Single thread, one readiness wait per iteration; the reporter deadline
// doubles as the poll timeout. Losing the GUI connection is fatal.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Instant;

use anyhow::{bail, Context as _};
use mio::net::{TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};

use worms_common::protocol::MAX_DGRAM_SIZE;

use crate::cl_input::GuiInput;
use crate::cl_parse::cl_ingest_datagram;
use crate::client::{ClientConfig, GameView, REPORT_INTERVAL};

const SERVER_SOCK: Token = Token(0);
const GUI_SOCK: Token = Token(1);
const EVENT_CAPACITY: usize = 16;

// ============================================================
// Setup
// ============================================================

pub fn cl_resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}"))
}

/// Unconnected UDP socket of the server's address family.
fn cl_setup_server_socket(server: SocketAddr) -> anyhow::Result<UdpSocket> {
    let domain = Domain::for_address(server);
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .context("opening server socket")?;
    socket.set_nonblocking(true).context("setting non-blocking mode")?;

    let bind_addr: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse().expect("literal address")
    } else {
        "[::]:0".parse().expect("literal address")
    };
    socket.bind(&bind_addr.into()).context("binding server socket")?;

    Ok(UdpSocket::from_std(socket.into()))
}

/// TCP connection to the GUI: SO_REUSEADDR and TCP_NODELAY on, then
/// non-blocking for the poll loop.
fn cl_setup_gui_socket(gui: SocketAddr) -> anyhow::Result<TcpStream> {
    let domain = Domain::for_address(gui);
    let socket =
        Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).context("opening gui socket")?;
    socket.set_reuse_address(true).context("setting SO_REUSEADDR")?;
    socket.set_nodelay(true).context("setting TCP_NODELAY")?;
    socket
        .connect(&gui.into())
        .with_context(|| format!("connecting to gui at {gui}"))?;
    socket.set_nonblocking(true).context("setting non-blocking mode")?;

    Ok(TcpStream::from_std(socket.into()))
}

// ============================================================
// Main loop
// ============================================================

pub fn cl_run(config: ClientConfig) -> anyhow::Result<()> {
    let server_addr = cl_resolve(&config.server_host, config.server_port)?;
    let gui_addr = cl_resolve(&config.gui_host, config.gui_port)?;

    let mut server_sock = cl_setup_server_socket(server_addr)?;
    let mut gui_sock = cl_setup_gui_socket(gui_addr)?;
    tracing::info!(%server_addr, %gui_addr, "client connected");

    let mut poll = Poll::new().context("creating poll instance")?;
    let mut events = Events::with_capacity(EVENT_CAPACITY);
    poll.registry()
        .register(&mut server_sock, SERVER_SOCK, Interest::READABLE)
        .context("registering server socket")?;
    poll.registry()
        .register(&mut gui_sock, GUI_SOCK, Interest::READABLE)
        .context("registering gui socket")?;

    let mut view = GameView::default();
    let mut gui_input = GuiInput::new();
    let mut next_report = Instant::now() + REPORT_INTERVAL;

    loop {
        let timeout = next_report.saturating_duration_since(Instant::now());
        if let Err(err) = poll.poll(&mut events, Some(timeout)) {
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err).context("poll");
            }
        }

        cl_get_events(&server_sock, &mut view)?;
        cl_flush_gui(&mut gui_sock, &mut view)?;
        cl_read_gui(&mut gui_sock, &mut gui_input, &mut view)?;

        let now = Instant::now();
        if now >= next_report {
            let report = view.report(&config).encode();
            server_sock
                .send_to(&report, server_addr)
                .context("sending move report")?;
            // One report per fire, however many periods elapsed.
            while next_report <= now {
                next_report += REPORT_INTERVAL;
            }
        }
    }
}

/// Drain the server socket, folding every datagram into the view.
fn cl_get_events(sock: &UdpSocket, view: &mut GameView) -> anyhow::Result<()> {
    let mut buf = [0u8; MAX_DGRAM_SIZE];
    loop {
        match sock.recv_from(&mut buf) {
            Ok((len, _)) => cl_ingest_datagram(view, &buf[..len])?,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            // Transient receive errors (e.g. ICMP port unreachable bounced
            // back on some platforms) are not fatal; try again next cycle.
            Err(err) => {
                tracing::debug!("recv error: {err}");
                return Ok(());
            }
        }
    }
}

/// Write pending GUI lines. The GUI is local, so a full send buffer is
/// rare and brief; spin until the line is out.
fn cl_flush_gui(gui: &mut TcpStream, view: &mut GameView) -> anyhow::Result<()> {
    for line in view.outbox.drain(..) {
        let bytes = line.as_bytes();
        let mut written = 0;
        while written < bytes.len() {
            match gui.write(&bytes[written..]) {
                Ok(0) => bail!("gui connection closed"),
                Ok(n) => written += n,
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::Interrupted =>
                {
                    continue
                }
                Err(err) => return Err(err).context("writing to gui"),
            }
        }
    }
    Ok(())
}

/// Drain GUI key events. Clean EOF means the GUI went away, which ends
/// the client.
fn cl_read_gui(
    gui: &mut TcpStream,
    input: &mut GuiInput,
    view: &mut GameView,
) -> anyhow::Result<()> {
    let mut buf = [0u8; 512];
    loop {
        match gui.read(&mut buf) {
            Ok(0) => bail!("lost connection to gui"),
            Ok(n) => input.feed(&buf[..n], &mut view.turn_direction),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("reading from gui"),
        }
    }
}
