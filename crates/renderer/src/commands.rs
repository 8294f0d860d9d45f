//! Out-of-band command signals raised by input handlers and drained by the
//! render loop.
//!
//! Each command kind owns a single slot (a bounded channel of capacity one):
//! raising a command that is already pending is a no-op, so a burst of key
//! presses collapses into one action on the next frame.

use std::collections::HashMap;
use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::CommandError;

/// Kinds of out-of-band requests. Declaration order is drain priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    Capture,
    Recolor,
}

impl CommandKind {
    pub const ALL: [CommandKind; 2] = [CommandKind::Capture, CommandKind::Recolor];
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Capture => f.write_str("capture"),
            CommandKind::Recolor => f.write_str("recolor"),
        }
    }
}

/// Result of raising a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issued {
    Queued,
    AlreadyPending,
}

struct Slot {
    tx: Sender<()>,
    rx: Receiver<()>,
}

/// Registry of single-slot command signals.
#[derive(Default)]
pub struct CommandChannels {
    slots: HashMap<CommandKind, Slot>,
}

impl CommandChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: CommandKind) -> Result<(), CommandError> {
        if self.slots.contains_key(&kind) {
            return Err(CommandError::AlreadyRegistered(kind));
        }
        let (tx, rx) = bounded(1);
        self.slots.insert(kind, Slot { tx, rx });
        tracing::trace!(command = %kind, "registered command channel");
        Ok(())
    }

    /// Removes a channel, dropping any pending signal with it.
    pub fn unregister(&mut self, kind: CommandKind) -> Result<(), CommandError> {
        self.slots
            .remove(&kind)
            .map(|_| ())
            .ok_or(CommandError::NotRegistered(kind))
    }

    pub fn is_registered(&self, kind: CommandKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn issue(&self, kind: CommandKind) -> Result<Issued, CommandError> {
        let slot = self
            .slots
            .get(&kind)
            .ok_or(CommandError::NotRegistered(kind))?;
        Ok(send(&slot.tx))
    }

    /// Clonable handle that can raise `kind` from another thread.
    pub fn sender(&self, kind: CommandKind) -> Result<CommandSender, CommandError> {
        let slot = self
            .slots
            .get(&kind)
            .ok_or(CommandError::NotRegistered(kind))?;
        Ok(CommandSender {
            kind,
            tx: slot.tx.clone(),
        })
    }

    /// Consumes the pending signal for `kind`, if any. Never blocks.
    pub fn take(&self, kind: CommandKind) -> bool {
        self.slots
            .get(&kind)
            .map(|slot| slot.rx.try_recv().is_ok())
            .unwrap_or(false)
    }

    /// Consumes at most one pending signal, highest priority first.
    pub fn drain_one(&self) -> Option<CommandKind> {
        CommandKind::ALL.into_iter().find(|kind| self.take(*kind))
    }

    pub fn is_pending(&self, kind: CommandKind) -> bool {
        self.slots
            .get(&kind)
            .map(|slot| !slot.rx.is_empty())
            .unwrap_or(false)
    }
}

/// Cross-thread handle for one command kind.
#[derive(Clone)]
pub struct CommandSender {
    kind: CommandKind,
    tx: Sender<()>,
}

impl CommandSender {
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn issue(&self) -> Issued {
        send(&self.tx)
    }
}

fn send(tx: &Sender<()>) -> Issued {
    match tx.try_send(()) {
        Ok(()) => Issued::Queued,
        // A disconnected slot only happens after unregister; nothing will drain it.
        Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {
            Issued::AlreadyPending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuing_unregistered_command_is_an_error() {
        let channels = CommandChannels::new();
        assert_eq!(
            channels.issue(CommandKind::Recolor),
            Err(CommandError::NotRegistered(CommandKind::Recolor))
        );
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut channels = CommandChannels::new();
        channels.register(CommandKind::Capture).unwrap();
        assert_eq!(
            channels.register(CommandKind::Capture),
            Err(CommandError::AlreadyRegistered(CommandKind::Capture))
        );
    }

    #[test]
    fn pending_signal_collapses_repeats() {
        let mut channels = CommandChannels::new();
        channels.register(CommandKind::Recolor).unwrap();
        assert_eq!(channels.issue(CommandKind::Recolor), Ok(Issued::Queued));
        assert_eq!(
            channels.issue(CommandKind::Recolor),
            Ok(Issued::AlreadyPending)
        );
        assert!(channels.take(CommandKind::Recolor));
        assert!(!channels.take(CommandKind::Recolor));
    }

    #[test]
    fn drain_one_prefers_capture_and_takes_one_signal() {
        let mut channels = CommandChannels::new();
        channels.register(CommandKind::Capture).unwrap();
        channels.register(CommandKind::Recolor).unwrap();
        channels.issue(CommandKind::Recolor).unwrap();
        channels.issue(CommandKind::Capture).unwrap();

        assert_eq!(channels.drain_one(), Some(CommandKind::Capture));
        assert!(channels.is_pending(CommandKind::Recolor));
        assert_eq!(channels.drain_one(), Some(CommandKind::Recolor));
        assert_eq!(channels.drain_one(), None);
    }

    #[test]
    fn sender_raises_from_another_thread() {
        let mut channels = CommandChannels::new();
        channels.register(CommandKind::Capture).unwrap();
        let sender = channels.sender(CommandKind::Capture).unwrap();
        std::thread::spawn(move || sender.issue()).join().unwrap();
        assert!(channels.take(CommandKind::Capture));
    }

    #[test]
    fn unregister_unknown_command_fails() {
        let mut channels = CommandChannels::new();
        assert_eq!(
            channels.unregister(CommandKind::Capture),
            Err(CommandError::NotRegistered(CommandKind::Capture))
        );
    }
}
