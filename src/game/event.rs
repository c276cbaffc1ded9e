//! Structured match events.
//!
//! The scheduler reports what it does as a stream of [`Event`]s handed to an
//! [`EventSink`]. Where the events end up is the sink's business: the CLI
//! writes them as JSON lines, tests collect them in a `Vec`.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// One record in the match log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// Warriors are placed. `starts` holds each player's start address in
    /// pid order.
    Init { cycle: u64, starts: Vec<u16> },
    /// One instruction step by player `pid` at address `ins`.
    ///
    /// `end` is the cycle after the instruction completed. It is absent when
    /// the instruction faulted or is still paying off its cycle cost.
    Exec {
        cycle: u64,
        pid: u8,
        ins: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<u64>,
    },
}

/// Destination for match events.
pub trait EventSink {
    fn emit(&mut self, event: &Event) -> io::Result<()>;
}

/// Collects events in memory.
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: &Event) -> io::Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for JsonLines<W> {
    fn emit(&mut self, event: &Event) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_format() {
        let event = Event::Init { cycle: 0, starts: vec![12, 40000] };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"init","cycle":0,"starts":[12,40000]}"#
        );
    }

    #[test]
    fn test_exec_format() {
        let done = Event::Exec { cycle: 3, pid: 2, ins: 256, end: Some(4) };
        assert_eq!(
            serde_json::to_string(&done).unwrap(),
            r#"{"type":"exec","cycle":3,"pid":2,"ins":256,"end":4}"#
        );

        let failed = Event::Exec { cycle: 3, pid: 2, ins: 256, end: None };
        assert_eq!(
            serde_json::to_string(&failed).unwrap(),
            r#"{"type":"exec","cycle":3,"pid":2,"ins":256}"#
        );
    }

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLines::new(Vec::new());
        sink.emit(&Event::Init { cycle: 0, starts: vec![0] }).unwrap();
        sink.emit(&Event::Exec { cycle: 1, pid: 1, ins: 0, end: Some(2) }).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Event = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, Event::Exec { cycle: 1, pid: 1, ins: 0, end: Some(2) });
    }
}
