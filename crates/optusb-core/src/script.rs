//! Scripted transport used by the unit tests

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::LinkError;
use crate::protocol::STATUS_RESPONSE_LEN;
use crate::transport::{Channel, Transport};

/// One recorded call on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Channel, Vec<u8>),
    Read(Channel, usize),
    Settle(Duration),
}

/// Canned reply to a read
pub enum Reply {
    Word(u32),
    Bytes(Vec<u8>),
    Fail(&'static str),
}

/// Transport that answers reads from a script and records every call
#[derive(Default)]
pub struct Script {
    replies: VecDeque<Reply>,
    /// Index of the write (counting from 0) to cut one byte short
    pub short_write: Option<usize>,
    /// Index of the write to fail outright
    pub failed_write: Option<usize>,
    pub events: Vec<Event>,
    writes: usize,
}

impl Script {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Status words that satisfy every handshake check
    pub fn happy() -> Self {
        Self::new([
            Reply::Word(0),
            Reply::Word(crate::protocol::MAGIC),
            Reply::Word(crate::protocol::MAGIC),
            Reply::Word(0),
            Reply::Word(0x03),
            Reply::Word(0),
        ])
    }

    pub fn writes(&self) -> Vec<(Channel, Vec<u8>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Write(c, d) => Some((*c, d.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn settles(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Settle(_)))
            .count()
    }
}

impl Transport for Script {
    fn write(
        &mut self,
        channel: Channel,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, LinkError> {
        let index = self.writes;
        self.writes += 1;
        self.events.push(Event::Write(channel, data.to_vec()));
        if self.failed_write == Some(index) {
            return Err(LinkError::new("pipe stalled"));
        }
        if self.short_write == Some(index) {
            return Ok(data.len() - 1);
        }
        Ok(data.len())
    }

    fn read(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, LinkError> {
        self.events.push(Event::Read(channel, buf.len()));
        match self.replies.pop_front() {
            Some(Reply::Word(v)) => {
                buf[..STATUS_RESPONSE_LEN].copy_from_slice(&v.to_le_bytes());
                Ok(STATUS_RESPONSE_LEN)
            }
            Some(Reply::Bytes(b)) => {
                let n = b.len().min(buf.len());
                buf[..n].copy_from_slice(&b[..n]);
                Ok(n)
            }
            Some(Reply::Fail(msg)) => Err(LinkError::new(msg)),
            None => Err(LinkError::new("timed out")),
        }
    }

    fn settle(&mut self, delay: Duration) {
        self.events.push(Event::Settle(delay));
    }
}
