// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted consumer for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Consumer, ConsumerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pj_core::Message;
use std::collections::VecDeque;
use std::sync::Arc;

/// What the scripted consumer does with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ack,
    Reject,
    Repush,
    /// Return `Ok` without settling the message
    Leave,
    /// Return an error
    Fail,
    /// Panic inside `consume`
    Panic,
}

struct ScriptState {
    script: VecDeque<Behavior>,
    fallback: Behavior,
    seen: Vec<Vec<u8>>,
}

/// Consumer that follows a script, then repeats a fallback behavior.
#[derive(Clone)]
pub struct ScriptedConsumer {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedConsumer {
    pub fn new(fallback: Behavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptState {
                script: VecDeque::new(),
                fallback,
                seen: Vec::new(),
            })),
        }
    }

    /// Queue behaviors for the next messages, in order.
    pub fn script(self, behaviors: impl IntoIterator<Item = Behavior>) -> Self {
        self.inner.lock().script.extend(behaviors);
        self
    }

    /// Bodies of every message consumed so far
    pub fn seen(&self) -> Vec<Vec<u8>> {
        self.inner.lock().seen.clone()
    }
}

#[async_trait]
impl Consumer for ScriptedConsumer {
    async fn consume(&self, message: &mut Message) -> Result<(), ConsumerError> {
        let behavior = {
            let mut state = self.inner.lock();
            state.seen.push(message.body().to_vec());
            let fallback = state.fallback;
            state.script.pop_front().unwrap_or(fallback)
        };
        match behavior {
            Behavior::Ack => {
                message.ack();
            }
            Behavior::Reject => {
                message.reject();
            }
            Behavior::Repush => {
                message.repush();
            }
            Behavior::Leave => {}
            Behavior::Fail => return Err(ConsumerError::Failed("scripted failure".into())),
            #[allow(clippy::panic)]
            Behavior::Panic => panic!("scripted panic"),
        }
        Ok(())
    }
}
