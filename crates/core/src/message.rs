// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dequeued message envelope and its terminal disposition.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Terminal outcome a consumer assigns to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Disposition {
    /// Processed; drop the message.
    Ack,
    /// Refused; drop the message without retry.
    Reject,
    /// Put the original payload back on the queue.
    Repush,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Ack => write!(f, "ACK"),
            Disposition::Reject => write!(f, "REJECT"),
            Disposition::Repush => write!(f, "REPUSH"),
        }
    }
}

/// A payload popped from a queue, waiting for exactly one disposition.
///
/// The disposition is write-once: the first of [`Message::ack`],
/// [`Message::reject`] or [`Message::repush`] wins and returns `true`;
/// later calls leave the message untouched and return `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Vec<u8>,
    disposition: Option<Disposition>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            disposition: None,
        }
    }

    /// Raw payload bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn ack(&mut self) -> bool {
        self.settle(Disposition::Ack)
    }

    pub fn reject(&mut self) -> bool {
        self.settle(Disposition::Reject)
    }

    pub fn repush(&mut self) -> bool {
        self.settle(Disposition::Repush)
    }

    pub fn is_done(&self) -> bool {
        self.disposition.is_some()
    }

    pub fn is_ack(&self) -> bool {
        self.disposition == Some(Disposition::Ack)
    }

    pub fn is_reject(&self) -> bool {
        self.disposition == Some(Disposition::Reject)
    }

    pub fn is_repush(&self) -> bool {
        self.disposition == Some(Disposition::Repush)
    }

    pub fn disposition(&self) -> Option<Disposition> {
        self.disposition
    }

    fn settle(&mut self, disposition: Disposition) -> bool {
        if self.disposition.is_some() {
            return false;
        }
        self.disposition = Some(disposition);
        true
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
