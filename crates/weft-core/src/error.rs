use thiserror::Error;

use crate::DescriptorId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal engine errors.
///
/// Every variant is a precondition violation: the caller (or a computation it
/// supplied) broke an engine invariant. They propagate out of the write or
/// render call that triggered them; the descriptor tree stays as mutated up to
/// that point.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot wrap a {found} value, only objects and arrays can be observed")]
    NotStructured { found: &'static str },

    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{operation} update on descriptor {descriptor:?} without a compatible rendering")]
    NotRendered {
        descriptor: DescriptorId,
        operation: &'static str,
    },

    #[error("presence update on static descriptor {descriptor:?}")]
    StaticDescriptor { descriptor: DescriptorId },

    #[error("unknown descriptor {0:?}")]
    UnknownDescriptor(DescriptorId),

    #[error("update chain exceeded {limit} nested notifications")]
    UpdateDepthExceeded { limit: usize },
}
