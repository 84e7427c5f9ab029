//! Render sinks: where finished board text goes.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    reading::LOADING_TEXT,
    registry::{EntityId, MonitoredEntity, Registry},
};

/// The receiving side of a render sink went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("render sink closed")]
pub struct SinkClosed;

/// Destination for per-entity board text.
pub trait RenderSink {
    /// Replace the text shown for `id`.
    fn update_text(&mut self, id: &EntityId, text: &str);

    /// Called once after every entity of a pass has been updated.
    fn present(&mut self) -> Result<(), SinkClosed> {
        Ok(())
    }
}

/// One entity slot on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    /// The entity this slot shows.
    pub entity: MonitoredEntity,
    /// Current text.
    pub text: String,
}

/// In-memory board holding one text per entity, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct Board {
    entries: Vec<BoardEntry>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Board {
    /// Seed a slot for every registry entity with "Loading".
    pub fn new(registry: &Registry) -> Self {
        let entries = registry
            .entities()
            .iter()
            .map(|entity| BoardEntry {
                entity: entity.clone(),
                text: LOADING_TEXT.to_string(),
            })
            .collect();
        Self {
            entries,
            refreshed_at: None,
        }
    }

    /// Slots in catalog order.
    pub fn entries(&self) -> &[BoardEntry] {
        &self.entries
    }

    /// Text currently shown for `id`.
    pub fn text(&self, id: &EntityId) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| &entry.entity.id == id)
            .map(|entry| entry.text.as_str())
    }

    /// When the last complete update was applied.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Apply a complete pass received from a [`ChannelSink`].
    pub fn apply(&mut self, update: &BoardUpdate) {
        for (id, text) in &update.texts {
            self.update_text(id, text);
        }
        self.refreshed_at = Some(update.refreshed_at);
    }
}

impl RenderSink for Board {
    fn update_text(&mut self, id: &EntityId, text: &str) {
        match self.entries.iter_mut().find(|entry| &entry.entity.id == id) {
            Some(entry) => {
                entry.text.clear();
                entry.text.push_str(text);
            }
            None => debug!(entity = %id, "Ignoring text for unknown entity"),
        }
    }

    fn present(&mut self) -> Result<(), SinkClosed> {
        self.refreshed_at = Some(Utc::now());
        Ok(())
    }
}

/// The full set of texts produced by one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardUpdate {
    /// Text per entity.
    pub texts: Vec<(EntityId, String)>,
    /// When the pass was presented.
    pub refreshed_at: DateTime<Utc>,
}

/// Buffers a pass and forwards it as a single [`BoardUpdate`].
#[derive(Debug)]
pub struct ChannelSink {
    pending: Vec<(EntityId, String)>,
    sender: mpsc::UnboundedSender<BoardUpdate>,
}

impl ChannelSink {
    /// Create a sink and the receiver the display reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BoardUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                pending: Vec::new(),
                sender,
            },
            receiver,
        )
    }
}

impl RenderSink for ChannelSink {
    fn update_text(&mut self, id: &EntityId, text: &str) {
        self.pending.push((id.clone(), text.to_string()));
    }

    fn present(&mut self) -> Result<(), SinkClosed> {
        let update = BoardUpdate {
            texts: std::mem::take(&mut self.pending),
            refreshed_at: Utc::now(),
        };
        self.sender.send(update).map_err(|_| SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{tests::spec, SourceKind};
    use anyhow::Result;

    fn registry() -> Result<Registry> {
        Registry::from_entities([
            spec(SourceKind::Train, "Red", "30121"),
            spec(SourceKind::BikeShare, "7", "Somewhere"),
        ])
    }

    #[test]
    fn board_starts_loading_and_tracks_updates() -> Result<()> {
        let registry = registry()?;
        let mut board = Board::new(&registry);
        let red = EntityId::new(SourceKind::Train, "Red", "30121");
        assert_eq!(board.text(&red), Some("Loading"));
        assert!(board.refreshed_at().is_none());

        board.update_text(&red, "2, 9");
        board.update_text(&EntityId::new(SourceKind::Bus, "1", "1"), "ignored");
        board.present()?;
        assert_eq!(board.text(&red), Some("2, 9"));
        assert_eq!(board.entries().len(), 2);
        assert!(board.refreshed_at().is_some());
        Ok(())
    }

    #[test]
    fn channel_sink_sends_whole_passes() -> Result<()> {
        let registry = registry()?;
        let (mut sink, mut receiver) = ChannelSink::channel();
        let red = EntityId::new(SourceKind::Train, "Red", "30121");
        let bikes = EntityId::new(SourceKind::BikeShare, "7", "Somewhere");

        sink.update_text(&red, "4");
        assert!(receiver.try_recv().is_err());
        sink.update_text(&bikes, "3 / 11");
        sink.present()?;

        let update = receiver.try_recv()?;
        assert_eq!(update.texts.len(), 2);

        let mut board = Board::new(&registry);
        board.apply(&update);
        assert_eq!(board.text(&bikes), Some("3 / 11"));
        assert_eq!(board.refreshed_at(), Some(update.refreshed_at));
        Ok(())
    }

    #[test]
    fn closed_channel_is_reported() {
        let (mut sink, receiver) = ChannelSink::channel();
        drop(receiver);
        sink.update_text(&EntityId::new(SourceKind::Bus, "22", "1902"), "1");
        assert_eq!(sink.present(), Err(SinkClosed));
    }
}
