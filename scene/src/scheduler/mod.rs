//! Command streams and their synchronization.
//!
//! A scene records its work into independently submitted command streams:
//!
//! | Stream | Command buffers | Completion semaphore |
//! |--------|-----------------|----------------------|
//! | swap-chain stream | one per presentable image | shared by every image |
//! | auxiliary stream | one | one per stream |
//!
//! Auxiliary streams are declared by the caller with
//! [`Scene::add_command_stream`](crate::Scene::add_command_stream). Passes pick
//! their stream through a [`StreamTarget`]. Ordering between streams is never
//! inferred: every frame the caller hands [`Scene::frame`](crate::Scene::frame)
//! the list of [`WaitEdge`]s to honour.
//!
//! # Example
//!
//! ```ignore
//! let shadows = scene.add_command_stream(CommandStreamDescriptor::new("shadows", StreamKind::Graphics))?;
//! let lighting = scene.add_command_stream(CommandStreamDescriptor::new("lighting", StreamKind::Compute))?;
//!
//! // lighting waits for shadows, the swap-chain stream waits for lighting
//! let edges = [
//!     WaitEdge::new(shadows, lighting),
//!     WaitEdge::new(lighting, StreamTarget::Swapchain),
//! ];
//! scene.frame(graphics, compute, image_index, Some(acquired), &[shadows.into(), lighting.into()], &edges)?;
//! ```

mod stream;
mod sync;

pub use stream::CommandStreamSet;
pub use sync::Semaphore;

use std::fmt;

use crate::backend::QueueClass;
use crate::types::PipelineStages;

/// Handle to an auxiliary command stream.
///
/// The Nth stream added to a scene has index N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
    /// Create a handle from a raw index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The stream a pass is recorded into, or an edge refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamTarget {
    /// The implicit per-presentable-image stream.
    #[default]
    Swapchain,
    /// An auxiliary stream.
    Stream(StreamId),
}

impl StreamTarget {
    /// Raw stream index, with `-1` for the swap-chain stream.
    pub fn raw(&self) -> i64 {
        match self {
            Self::Swapchain => -1,
            Self::Stream(id) => id.index() as i64,
        }
    }

    /// Parse a raw stream index. Any negative value is the swap-chain stream.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Swapchain
        } else {
            Self::Stream(StreamId::new(raw as u32))
        }
    }

    /// The auxiliary stream, if this is not the swap-chain stream.
    pub fn stream(&self) -> Option<StreamId> {
        match self {
            Self::Swapchain => None,
            Self::Stream(id) => Some(*id),
        }
    }

    /// Returns true for the swap-chain stream.
    pub fn is_swapchain(&self) -> bool {
        matches!(self, Self::Swapchain)
    }
}

impl From<StreamId> for StreamTarget {
    fn from(id: StreamId) -> Self {
        Self::Stream(id)
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swapchain => write!(f, "swapchain"),
            Self::Stream(id) => write!(f, "stream {}", id.index()),
        }
    }
}

/// Kind of work an auxiliary stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamKind {
    /// Graphics work, submitted to the graphics queue.
    #[default]
    Graphics,
    /// Compute work, submitted to the compute queue.
    Compute,
    /// Ray-tracing work, submitted to the graphics queue.
    RayTracing,
}

impl StreamKind {
    /// Queue class the stream is allocated for and submitted to.
    pub fn queue_class(&self) -> QueueClass {
        match self {
            Self::Graphics | Self::RayTracing => QueueClass::Graphics,
            Self::Compute => QueueClass::Compute,
        }
    }
}

/// Descriptor for an auxiliary command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStreamDescriptor {
    /// Debug label.
    pub label: String,
    /// Kind of work, which selects the queue.
    pub kind: StreamKind,
    /// Stage consumers of this stream wait at.
    pub final_stage: PipelineStages,
}

impl CommandStreamDescriptor {
    /// Create a stream descriptor waited on at every stage.
    pub fn new(label: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            label: label.into(),
            kind,
            final_stage: PipelineStages::default(),
        }
    }

    /// Set the stage consumers wait at.
    pub fn with_final_stage(mut self, stage: PipelineStages) -> Self {
        self.final_stage = stage;
        self
    }
}

/// "`consumer` waits for `producer` to complete" for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitEdge {
    /// Stream whose completion semaphore is waited on.
    pub producer: StreamTarget,
    /// Stream that waits.
    pub consumer: StreamTarget,
}

impl WaitEdge {
    /// Create an edge.
    pub fn new(producer: impl Into<StreamTarget>, consumer: impl Into<StreamTarget>) -> Self {
        Self {
            producer: producer.into(),
            consumer: consumer.into(),
        }
    }

    /// Edge from an auxiliary stream to the swap-chain stream.
    pub fn to_swapchain(producer: StreamId) -> Self {
        Self::new(producer, StreamTarget::Swapchain)
    }

    /// Create an edge from raw stream indices (`-1` for the swap-chain stream).
    pub fn from_raw(producer: i64, consumer: i64) -> Self {
        Self::new(
            StreamTarget::from_raw(producer),
            StreamTarget::from_raw(consumer),
        )
    }
}

/// Keep the edges that can be honoured with `stream_count` auxiliary streams.
///
/// Invalid edges are reported and dropped: the swap-chain stream cannot be
/// waited on, and both ends must name existing streams.
pub(crate) fn valid_edges(edges: &[WaitEdge], stream_count: usize) -> Vec<WaitEdge> {
    edges
        .iter()
        .filter(|edge| {
            let Some(producer) = edge.producer.stream() else {
                log::error!(
                    "Wait edge {} -> {}: the swapchain stream cannot be waited on, edge ignored",
                    edge.producer,
                    edge.consumer
                );
                return false;
            };
            if producer.index() >= stream_count {
                log::error!(
                    "Wait edge {} -> {}: producer does not exist ({} streams), edge ignored",
                    edge.producer,
                    edge.consumer,
                    stream_count
                );
                return false;
            }
            if let Some(consumer) = edge.consumer.stream()
                && consumer.index() >= stream_count
            {
                log::error!(
                    "Wait edge {} -> {}: consumer does not exist ({} streams), edge ignored",
                    edge.producer,
                    edge.consumer,
                    stream_count
                );
                return false;
            }
            true
        })
        .copied()
        .collect()
}

/// Producers `consumer` waits for, in edge order.
pub(crate) fn producers_of(edges: &[WaitEdge], consumer: StreamTarget) -> Vec<StreamId> {
    edges
        .iter()
        .filter(|edge| edge.consumer == consumer)
        .filter_map(|edge| edge.producer.stream())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_target_raw() {
        assert_eq!(StreamTarget::Swapchain.raw(), -1);
        assert_eq!(StreamTarget::from(StreamId::new(2)).raw(), 2);
        assert_eq!(StreamTarget::from_raw(-1), StreamTarget::Swapchain);
        assert_eq!(
            StreamTarget::from_raw(0),
            StreamTarget::Stream(StreamId::new(0))
        );
    }

    #[test]
    fn test_stream_kind_queue() {
        assert_eq!(StreamKind::Graphics.queue_class(), QueueClass::Graphics);
        assert_eq!(StreamKind::RayTracing.queue_class(), QueueClass::Graphics);
        assert_eq!(StreamKind::Compute.queue_class(), QueueClass::Compute);
    }

    #[test]
    fn test_invalid_edges_dropped() {
        let a = StreamId::new(0);
        let b = StreamId::new(1);
        let edges = [
            WaitEdge::new(a, b),
            WaitEdge::new(StreamTarget::Swapchain, a),
            WaitEdge::new(StreamId::new(5), a),
            WaitEdge::new(a, StreamId::new(9)),
            WaitEdge::to_swapchain(b),
        ];

        let valid = valid_edges(&edges, 2);
        assert_eq!(valid, vec![WaitEdge::new(a, b), WaitEdge::to_swapchain(b)]);
    }

    #[test]
    fn test_producers_of() {
        let a = StreamId::new(0);
        let b = StreamId::new(1);
        let c = StreamId::new(2);
        let edges = [
            WaitEdge::new(a, c),
            WaitEdge::new(b, c),
            WaitEdge::to_swapchain(c),
        ];

        assert_eq!(producers_of(&edges, c.into()), vec![a, b]);
        assert_eq!(producers_of(&edges, StreamTarget::Swapchain), vec![c]);
        assert!(producers_of(&edges, a.into()).is_empty());
    }
}
