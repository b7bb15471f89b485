//! Error type shared by every layer of the engine.

use crate::object::{Kind, ObjectId};
use std::io;

/// Failures that abort an optimize run.
///
/// None of these are retried. A pass either completes or the error is
/// returned to the caller, who decides whether to keep the graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stream payload could not be read to the end while hashing.
    #[error("failed to read payload of stream {id:?}")]
    PayloadRead {
        id: ObjectId,
        #[source]
        source: io::Error,
    },

    /// A non-composite object reached an operation that needs a container.
    #[error("object {id:?} is {kind:?}, expected an array, dictionary or stream")]
    UnsupportedKind { id: ObjectId, kind: Kind },

    /// The id is not (or no longer) stored in the graph.
    #[error("object {0:?} is not in the graph")]
    UnknownObject(ObjectId),

    /// Following aliases from this object never reaches a non-alias.
    #[error("alias chain starting at {0:?} loops")]
    IndirectionCycle(ObjectId),

    /// The slot a reference points into no longer exists.
    #[error("reference from {from:?} points at a slot that no longer exists")]
    StaleReference { from: ObjectId },
}

pub type Result<T> = core::result::Result<T, Error>;
