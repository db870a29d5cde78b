//! The line-oriented coordinator protocol.
//!
//! Outbound lines announce new sub-tasks and locally derived unsat verdicts; inbound lines carry
//! the coordinator's verdicts back. Every complete line is one message. Reads never block: the
//! worker polls between engine steps.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::io::Read;
use std::io::Write;

use crate::error::EngineError;

/// Worker-to-coordinator messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Free-form diagnostics, safe for the coordinator to ignore.
    Debug(String),
    /// A new open sub-task exists. `parent` is `None` for the root.
    NewUnknownNode { node: u32, parent: Option<u32> },
    /// A sub-task was closed UNSAT locally.
    NewUnsatNode { node: u32, parent: Option<u32> },
    /// Overall verdicts (reserved).
    Sat,
    Unsat,
    Unknown,
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent_id = |parent: &Option<u32>| parent.map(|p| p as i64).unwrap_or(-1);
        match self {
            OutboundMessage::Debug(text) => write!(f, "0 {text}"),
            OutboundMessage::NewUnknownNode { node, parent } => {
                write!(f, "1 {} {}", node, parent_id(parent))
            }
            OutboundMessage::NewUnsatNode { node, parent } => {
                write!(f, "2 {} {}", node, parent_id(parent))
            }
            OutboundMessage::Sat => write!(f, "3"),
            OutboundMessage::Unsat => write!(f, "4"),
            OutboundMessage::Unknown => write!(f, "5"),
        }
    }
}

/// Coordinator-to-worker messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    /// A downstream solver proved the sub-task unsatisfiable.
    UnsatNode(u32),
    /// The coordinator aborted the sub-task without a verdict.
    TerminateNode(u32),
}

impl InboundMessage {
    pub fn parse(line: &str) -> Result<InboundMessage, EngineError> {
        let mut fields = line.split_whitespace();
        let tag = fields.next();
        let id = fields.next().and_then(|f| f.parse::<u32>().ok());
        match (tag, id, fields.next()) {
            (Some("0"), Some(id), None) => Ok(InboundMessage::UnsatNode(id)),
            (Some("1"), Some(id), None) => Ok(InboundMessage::TerminateNode(id)),
            _ => Err(EngineError::Protocol(line.to_owned())),
        }
    }
}

/// The byte-stream seam between the worker and its coordinator. Production code talks over
/// stdin/stdout; tests use an in-memory channel.
pub trait Transport {
    /// Fetch the next complete inbound line, without blocking.
    fn poll_line(&mut self) -> io::Result<Option<String>>;

    /// Emit one outbound line, flushed immediately.
    fn send_line(&mut self, line: &str) -> io::Result<()>;
}

/// Stdin/stdout transport. Stdin is switched to non-blocking mode on construction; partial lines
/// are buffered until their newline arrives.
#[derive(Debug)]
pub struct StdioTransport {
    pending: Vec<u8>,
    lines: VecDeque<String>,
}

impl StdioTransport {
    pub fn new() -> io::Result<StdioTransport> {
        // Safety: fcntl on the process's own stdin descriptor.
        let result = unsafe {
            let flags = libc::fcntl(libc::STDIN_FILENO, libc::F_GETFL, 0);
            if flags < 0 {
                flags
            } else {
                libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags | libc::O_NONBLOCK)
            }
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(StdioTransport {
            pending: Vec::new(),
            lines: VecDeque::new(),
        })
    }

    fn drain_stdin(&mut self) -> io::Result<()> {
        let mut buffer = [0_u8; 1024];
        loop {
            match io::stdin().lock().read(&mut buffer) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    self.pending.extend_from_slice(&buffer[..n]);
                    while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                        let _ = line.pop();
                        if line.last() == Some(&b'\r') {
                            let _ = line.pop();
                        }
                        self.lines
                            .push_back(String::from_utf8_lossy(&line).into_owned());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl Transport for StdioTransport {
    fn poll_line(&mut self) -> io::Result<Option<String>> {
        if self.lines.is_empty() {
            self.drain_stdin()?;
        }
        Ok(self.lines.pop_front())
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()
    }
}

/// In-memory transport for tests and embedding: inbound lines are queued by the harness, outbound
/// lines are collected for inspection.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    inbound: VecDeque<String>,
    outbound: Vec<String>,
}

impl ChannelTransport {
    pub fn new() -> ChannelTransport {
        ChannelTransport::default()
    }

    pub fn push_inbound(&mut self, line: impl Into<String>) {
        self.inbound.push_back(line.into());
    }

    pub fn outbound(&self) -> &[String] {
        &self.outbound
    }

    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }
}

impl Transport for ChannelTransport {
    fn poll_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.inbound.pop_front())
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.outbound.push(line.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_lines_match_the_wire_format() {
        assert_eq!(
            OutboundMessage::NewUnknownNode {
                node: 3,
                parent: Some(1)
            }
            .to_string(),
            "1 3 1"
        );
        assert_eq!(
            OutboundMessage::NewUnsatNode {
                node: 0,
                parent: None
            }
            .to_string(),
            "2 0 -1"
        );
        assert_eq!(OutboundMessage::Debug("hello".to_owned()).to_string(), "0 hello");
    }

    #[test]
    fn inbound_lines_parse_and_reject_garbage() {
        assert_eq!(
            InboundMessage::parse("0 7").unwrap(),
            InboundMessage::UnsatNode(7)
        );
        assert_eq!(
            InboundMessage::parse(" 1  12 ").unwrap(),
            InboundMessage::TerminateNode(12)
        );
        assert!(InboundMessage::parse("2 1").is_err());
        assert!(InboundMessage::parse("0").is_err());
        assert!(InboundMessage::parse("0 x").is_err());
        assert!(InboundMessage::parse("0 1 2").is_err());
    }

    #[test]
    fn channel_transport_queues_lines_in_order() {
        let mut transport = ChannelTransport::new();
        transport.push_inbound("0 1");
        transport.push_inbound("1 2");

        assert_eq!(transport.poll_line().unwrap().as_deref(), Some("0 1"));
        assert_eq!(transport.poll_line().unwrap().as_deref(), Some("1 2"));
        assert_eq!(transport.poll_line().unwrap(), None);

        transport.send_line("2 5 0").unwrap();
        assert_eq!(transport.outbound(), &["2 5 0".to_owned()]);
    }
}
