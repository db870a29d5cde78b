/// Fatal engine failures. These unwind to the driver; the paving state is not recoverable
/// afterwards. Soundness-preserving degradations (a failed interval operation during propagation)
/// are *not* errors: the offending constraint is skipped and a flag is raised instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The global bound counter reached its ceiling.
    #[error("bound timestamp counter overflowed")]
    TimestampOverflow,

    /// The driver's termination condition fired (cancellation, time or memory ceiling).
    #[error("the partitioner was cancelled")]
    Cancelled,

    /// A split midpoint coincided with an interval endpoint; the node cannot be subdivided.
    #[error("node {0} cannot be split: the midpoint touches an interval endpoint")]
    UnsplittableNode(u32),

    /// An inbound coordinator line did not match the protocol.
    #[error("malformed coordinator message: {0:?}")]
    Protocol(String),

    /// The coordinator channel failed.
    #[error("coordinator i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
