use std::collections::VecDeque;

use crate::database::models::Message;

/// Bounded FIFO of pending messages. Once full, new messages are dropped until the owner drains.
#[derive(Debug)]
pub struct Mailbox {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.capacity
    }

    /// Returns false when the message was dropped.
    pub fn push(&mut self, message: Message) -> bool {
        if self.is_full() {
            return false;
        }
        self.messages.push_back(message);
        true
    }

    pub fn drain(&mut self) -> Vec<Message> {
        self.messages.drain(..).collect()
    }

    //Takes the oldest messages whose rendered lines ("<message>\n") fit in `limit` bytes. Anything
    //left over stays queued in order.
    pub fn drain_within(&mut self, limit: usize) -> Vec<Message> {
        let mut used = 0;
        let mut take = 0;
        for message in &self.messages {
            let line = message.to_string().len() + 1;
            if used + line > limit {
                break;
            }
            used += line;
            take += 1;
        }
        self.messages.drain(..take).collect()
    }
}
