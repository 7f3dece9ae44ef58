//! Timestamp service client.
//!
//! Each captured frame is stamped by an external timestamp service over a
//! request/reply round-trip: the client sends the line `timestamp`, the
//! service replies with one line holding the current value of its
//! free-running tick counter (33 kHz on the acquisition rig).
//!
//! The client is responsible for:
//! - One blocking round-trip per frame over a single reused TCP connection
//! - Parsing tick-count replies into `Ticks`
//! - Surfacing a dead service as an error (read timeout) instead of a hang
//!
//! `stub://` endpoints produce a deterministic synthetic clock for tests
//! and bench runs.

mod rate;

pub use rate::RateEstimator;

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;
use url::Url;

use crate::{Ticks, DEFAULT_TICKS_PER_SECOND};

/// Request line sent for every frame.
const TIMESTAMP_REQUEST: &[u8] = b"timestamp\n";

/// Configuration for the timestamp service client.
#[derive(Clone, Debug)]
pub struct ClockConfig {
    /// Service endpoint. Supported schemes: tcp:// for the real service,
    /// stub:// for the synthetic clock.
    pub endpoint: String,
    /// Tick rate of the service counter, in ticks per second.
    pub ticks_per_second: u32,
    /// Read timeout for a single round-trip.
    pub timeout: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:5556".to_string(),
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Timestamp service client.
pub struct ClockClient {
    backend: ClockBackend,
}

enum ClockBackend {
    Stub(StubClock),
    Tcp(TcpClock),
}

impl ClockClient {
    pub fn new(config: ClockConfig) -> Result<Self> {
        let url = Url::parse(&config.endpoint).context("parse clock endpoint")?;
        let backend = match url.scheme() {
            "stub" => ClockBackend::Stub(StubClock::new(&config)),
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| anyhow!("clock endpoint missing host"))?;
                let port = url
                    .port()
                    .ok_or_else(|| anyhow!("clock endpoint missing port"))?;
                ClockBackend::Tcp(TcpClock::new(&config, format!("{}:{}", host, port)))
            }
            other => {
                return Err(anyhow!(
                    "unsupported clock scheme '{}'; expected tcp or stub",
                    other
                ))
            }
        };
        Ok(Self { backend })
    }

    /// Connect to the timestamp service.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            ClockBackend::Stub(clock) => clock.connect(),
            ClockBackend::Tcp(clock) => clock.connect(),
        }
    }

    /// One request/reply round-trip; returns the service's tick count.
    pub fn request_timestamp(&mut self) -> Result<Ticks> {
        match &mut self.backend {
            ClockBackend::Stub(clock) => clock.request_timestamp(),
            ClockBackend::Tcp(clock) => clock.request_timestamp(),
        }
    }

    /// Check if the client is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            ClockBackend::Stub(clock) => clock.is_healthy(),
            ClockBackend::Tcp(clock) => clock.is_healthy(),
        }
    }

    /// Get round-trip statistics.
    pub fn stats(&self) -> ClockStats {
        match &self.backend {
            ClockBackend::Stub(clock) => clock.stats(),
            ClockBackend::Tcp(clock) => clock.stats(),
        }
    }
}

/// Statistics for a clock client.
#[derive(Clone, Debug)]
pub struct ClockStats {
    pub requests: u64,
    pub endpoint: String,
}

// ----------------------------------------------------------------------------
// Synthetic clock (stub://) for tests
// ----------------------------------------------------------------------------

struct StubClock {
    endpoint: String,
    ticks: Ticks,
    step: Ticks,
    requests: u64,
}

impl StubClock {
    fn new(config: &ClockConfig) -> Self {
        // Advance one nominal 30 fps frame interval per request.
        let step = (config.ticks_per_second as Ticks / 30).max(1);
        Self {
            endpoint: config.endpoint.clone(),
            ticks: 0,
            step,
            requests: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("ClockClient: connected to {} (synthetic)", self.endpoint);
        Ok(())
    }

    fn request_timestamp(&mut self) -> Result<Ticks> {
        let ticks = self.ticks;
        self.ticks += self.step;
        self.requests += 1;
        Ok(ticks)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> ClockStats {
        ClockStats {
            requests: self.requests,
            endpoint: self.endpoint.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// TCP line-protocol client
// ----------------------------------------------------------------------------

struct TcpClock {
    endpoint: String,
    addr: String,
    timeout: Duration,
    state: Option<TcpClockState>,
    requests: u64,
    last_error: Option<String>,
}

struct TcpClockState {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TcpClock {
    fn new(config: &ClockConfig, addr: String) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            addr,
            timeout: config.timeout,
            state: None,
            requests: 0,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect(&self.addr)
            .with_context(|| format!("connect to timestamp service at {}", self.addr))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .context("set clock read timeout")?;
        stream.set_nodelay(true).context("set clock tcp_nodelay")?;
        let reader = BufReader::new(stream.try_clone().context("clone clock stream")?);
        self.state = Some(TcpClockState { stream, reader });
        self.last_error = None;
        log::info!("ClockClient: connected to {}", self.endpoint);
        Ok(())
    }

    fn request_timestamp(&mut self) -> Result<Ticks> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("clock not connected; call connect() first"))?;

        let result = Self::round_trip(state);
        match &result {
            Ok(_) => self.requests += 1,
            Err(err) => self.last_error = Some(err.to_string()),
        }
        result
    }

    fn round_trip(state: &mut TcpClockState) -> Result<Ticks> {
        state
            .stream
            .write_all(TIMESTAMP_REQUEST)
            .context("send timestamp request")?;
        state.stream.flush().context("flush timestamp request")?;

        let mut line = String::new();
        let read = state
            .reader
            .read_line(&mut line)
            .context("read timestamp reply")?;
        if read == 0 {
            return Err(anyhow!("timestamp service closed the connection"));
        }
        let trimmed = line.trim();
        trimmed
            .parse::<Ticks>()
            .with_context(|| format!("malformed timestamp reply '{}'", trimmed))
    }

    fn is_healthy(&self) -> bool {
        self.state.is_some() && self.last_error.is_none()
    }

    fn stats(&self) -> ClockStats {
        ClockStats {
            requests: self.requests,
            endpoint: self.endpoint.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    fn stub_config() -> ClockConfig {
        ClockConfig {
            endpoint: "stub://bench".to_string(),
            ..ClockConfig::default()
        }
    }

    #[test]
    fn stub_clock_is_deterministic() -> Result<()> {
        let mut clock = ClockClient::new(stub_config())?;
        clock.connect()?;

        let t0 = clock.request_timestamp()?;
        let t1 = clock.request_timestamp()?;
        let t2 = clock.request_timestamp()?;

        assert_eq!(t1 - t0, t2 - t1);
        assert_eq!(t1 - t0, (DEFAULT_TICKS_PER_SECOND as Ticks) / 30);
        assert_eq!(clock.stats().requests, 3);
        Ok(())
    }

    #[test]
    fn rejects_unknown_schemes() {
        let config = ClockConfig {
            endpoint: "udp://127.0.0.1:5556".to_string(),
            ..ClockConfig::default()
        };
        assert!(ClockClient::new(config).is_err());
    }

    #[test]
    fn request_before_connect_fails() -> Result<()> {
        let config = ClockConfig {
            endpoint: "tcp://127.0.0.1:1".to_string(),
            ..ClockConfig::default()
        };
        let mut clock = ClockClient::new(config)?;
        assert!(clock.request_timestamp().is_err());
        Ok(())
    }

    /// Single-round-trip fake timestamp service.
    fn serve_one_reply(listener: TcpListener, reply: &'static str) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut line = String::new();
            reader.read_line(&mut line).expect("read request");
            assert_eq!(line, "timestamp\n");
            let mut stream = stream;
            stream.write_all(reply.as_bytes()).expect("write reply");
        })
    }

    #[test]
    fn tcp_round_trip_parses_tick_reply() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let server = serve_one_reply(listener, "123456\n");

        let config = ClockConfig {
            endpoint: format!("tcp://{}", addr),
            ..ClockConfig::default()
        };
        let mut clock = ClockClient::new(config)?;
        clock.connect()?;

        assert_eq!(clock.request_timestamp()?, 123_456);
        assert!(clock.is_healthy());
        server.join().unwrap();
        Ok(())
    }

    #[test]
    fn tcp_round_trip_rejects_garbage_reply() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let server = serve_one_reply(listener, "not-a-number\n");

        let config = ClockConfig {
            endpoint: format!("tcp://{}", addr),
            ..ClockConfig::default()
        };
        let mut clock = ClockClient::new(config)?;
        clock.connect()?;

        assert!(clock.request_timestamp().is_err());
        assert!(!clock.is_healthy());
        server.join().unwrap();
        Ok(())
    }
}
