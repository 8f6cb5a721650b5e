/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Checks that a locally reconstructed board matches the authority's.

use std::time::SystemTime;

use crate::events::{ChecksumMismatchEvent, Event, EventPublisher};
use crate::types::{
    board::Board,
    checksum::{checksum, Checksum},
    data_types::{ConnectionId, SequenceNumber},
};

use super::ConsistencyViolation;

/// Identifies what is being validated, for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationContext {
    pub connection: ConnectionId,
    pub sequence_number: SequenceNumber,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub matches: bool,
    pub local_checksum: Checksum,
    pub received_checksum: Checksum,
}

impl ValidationResult {
    pub fn into_violation(self, context: &ValidationContext) -> Option<ConsistencyViolation> {
        if self.matches {
            None
        } else {
            Some(ConsistencyViolation::ChecksumMismatch {
                sequence_number: context.sequence_number,
                local: self.local_checksum,
                received: self.received_checksum,
            })
        }
    }
}

#[derive(Clone, Default)]
pub struct SyncValidator {
    event_publisher: EventPublisher,
}

impl SyncValidator {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }

    /// Compare the checksum of `local_board` with `received_checksum`, publishing a
    /// `ChecksumMismatch` event if they differ.
    pub fn validate(
        &self,
        local_board: &Board,
        received_checksum: Checksum,
        context: &ValidationContext,
    ) -> ValidationResult {
        let local_checksum = checksum(local_board);
        let matches = local_checksum == received_checksum;

        if !matches {
            self.event_publisher
                .publish(Event::ChecksumMismatch(ChecksumMismatchEvent {
                    timestamp: SystemTime::now(),
                    connection: context.connection,
                    sequence_number: context.sequence_number,
                    local_checksum,
                    received_checksum,
                }));
        }

        ValidationResult {
            matches,
            local_checksum,
            received_checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::engine::CascadeEngine;
    use std::sync::mpsc;

    fn context() -> ValidationContext {
        ValidationContext {
            connection: ConnectionId::new(3),
            sequence_number: SequenceNumber::new(17),
        }
    }

    #[test]
    fn matching_checksum_is_silent() {
        let (sender, receiver) = mpsc::channel();
        let validator = SyncValidator::new(EventPublisher::to_event_bus(sender));
        let board = CascadeEngine::seeded(1).fill_board(4, 4).unwrap();

        let result = validator.validate(&board, checksum(&board), &context());

        assert!(result.matches);
        assert_eq!(result.into_violation(&context()), None);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn mismatch_is_published() {
        let (sender, receiver) = mpsc::channel();
        let validator = SyncValidator::new(EventPublisher::to_event_bus(sender));
        let board = CascadeEngine::seeded(1).fill_board(4, 4).unwrap();
        let other = CascadeEngine::seeded(2).fill_board(4, 4).unwrap();

        let result = validator.validate(&board, checksum(&other), &context());

        assert!(!result.matches);
        assert_eq!(result.local_checksum, checksum(&board));
        match receiver.try_recv() {
            Ok(Event::ChecksumMismatch(event)) => {
                assert_eq!(event.connection, ConnectionId::new(3));
                assert_eq!(event.sequence_number, SequenceNumber::new(17));
                assert_eq!(event.received_checksum, checksum(&other));
            }
            _ => panic!("expected a ChecksumMismatch event"),
        }
    }
}
