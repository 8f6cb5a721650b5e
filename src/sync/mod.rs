/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Keeping an observer's copy of a board consistent with the authority's.
//!
//! An observer applies every [diff](crate::networking::messages::BoardDiff) it receives to its local
//! board, then asks the [`SyncValidator`](validator::SyncValidator) whether the result hashes to the
//! checksum the authority attached to the diff. If it does not, or if the diff does not directly
//! follow the local board, the [`ResyncCoordinator`](coordinator::ResyncCoordinator) requests a full
//! snapshot from the authority and stops applying diffs until one arrives.
//!
//! [`BoardObserver`](observer::BoardObserver) ties these together over a
//! [`Network`](crate::networking::network::Network).

pub mod validator;

pub mod coordinator;

pub mod observer;

use crate::cascade::engine::ValidationError;
use crate::types::{
    change_set::ChangeSetShapeError,
    checksum::Checksum,
    data_types::{ConnectionId, SequenceNumber},
};

/// Evidence that an observer's board has diverged from the authority's. Recoverable by resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyViolation {
    ChecksumMismatch {
        sequence_number: SequenceNumber,
        local: Checksum,
        received: Checksum,
    },

    /// A diff arrived that does not directly follow the local board. Covers both gaps and
    /// regressions.
    SequenceGap {
        expected: SequenceNumber,
        received: SequenceNumber,
    },

    /// A diff could not be applied to the local board.
    MalformedChanges {
        sequence_number: SequenceNumber,
        reason: MalformedReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    Shape(ChangeSetShapeError),
    Invariant(crate::types::board::InvariantViolation),
}

/// Resynchronization was retried as many times as allowed without receiving a usable snapshot. The
/// connection cannot be used any more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecoverableDesync {
    pub connection: ConnectionId,
    pub attempts: u32,
}

/// Enumerates the reasons [`BoardObserver::request_clear`](observer::BoardObserver::request_clear)
/// can refuse to send a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestClearError {
    /// No snapshot has been installed yet, so there are no tiles to name in the request.
    NoBoard,

    /// The positions are not a valid clear set on the local board.
    Validation(ValidationError),

    /// See: [`UnrecoverableDesync`].
    Unrecoverable(UnrecoverableDesync),
}

impl From<ValidationError> for RequestClearError {
    fn from(value: ValidationError) -> Self {
        RequestClearError::Validation(value)
    }
}

impl From<UnrecoverableDesync> for RequestClearError {
    fn from(value: UnrecoverableDesync) -> Self {
        RequestClearError::Unrecoverable(value)
    }
}
