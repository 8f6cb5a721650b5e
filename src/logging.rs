/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via
//! [`Configuration::log_events`](crate::config::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [ChecksumMismatch](crate::events::ChecksumMismatchEvent) is printed:
//!
//! ```text
//! ChecksumMismatch, 1701329264, 3, 17, fNGCJyk, Id5u7f6
//! ```
//!
//! In the snippet:
//! - The third value is the observer's connection id.
//! - The fourth value is the sequence number of the diff that failed validation.
//! - The fifth and sixth values are the first seven characters of the base64 encoding of the local
//!   and the received checksum.
//!
//! Events that indicate divergence are logged at `warn` level, `UnrecoverableDesync` at `error`,
//! and everything else at `info`.

use std::time::SystemTime;

use crate::events::*;
use crate::types::checksum::Checksum;

// Names of each event in PascalCase for printing:
pub const GENERATE_BOARD: &str = "GenerateBoard";
pub const APPLY_CHANGES: &str = "ApplyChanges";
pub const REJECT_MUTATION: &str = "RejectMutation";
pub const BROADCAST_CHANGES: &str = "BroadcastChanges";
pub const SEND_SNAPSHOT: &str = "SendSnapshot";

pub const RECEIVE_CHANGES: &str = "ReceiveChanges";
pub const CHECKSUM_MISMATCH: &str = "ChecksumMismatch";
pub const SEQUENCE_GAP: &str = "SequenceGap";
pub const MALFORMED_CHANGES: &str = "MalformedChanges";
pub const RECEIVE_PONG: &str = "ReceivePong";

pub const REQUEST_SNAPSHOT: &str = "RequestSnapshot";
pub const INSTALL_SNAPSHOT: &str = "InstallSnapshot";
pub const DISCARD_SNAPSHOT: &str = "DiscardSnapshot";
pub const SNAPSHOT_TIMEOUT: &str = "SnapshotTimeout";
pub const UNRECOVERABLE_DESYNC: &str = "UnrecoverableDesync";
pub const DISCONNECT: &str = "Disconnect";

pub const RAISE_ALERT: &str = "RaiseAlert";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for GenerateBoardEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |generate_board_event: &GenerateBoardEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                GENERATE_BOARD,
                secs_since_unix_epoch(generate_board_event.timestamp),
                generate_board_event.attempts,
                generate_board_event.words_found,
                first_seven_base64_chars(&generate_board_event.checksum)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ApplyChangesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |apply_changes_event: &ApplyChangesEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                APPLY_CHANGES,
                secs_since_unix_epoch(apply_changes_event.timestamp),
                apply_changes_event.board,
                apply_changes_event.sequence_number,
                apply_changes_event.removed,
                first_seven_base64_chars(&apply_changes_event.checksum)
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectMutationEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_mutation_event: &RejectMutationEvent| {
            log::info!(
                "{}, {}, {:?}",
                REJECT_MUTATION,
                secs_since_unix_epoch(reject_mutation_event.timestamp),
                reject_mutation_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for BroadcastChangesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |broadcast_changes_event: &BroadcastChangesEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                BROADCAST_CHANGES,
                secs_since_unix_epoch(broadcast_changes_event.timestamp),
                broadcast_changes_event.board,
                broadcast_changes_event.sequence_number,
                broadcast_changes_event.recipients
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendSnapshotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |send_snapshot_event: &SendSnapshotEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SEND_SNAPSHOT,
                secs_since_unix_epoch(send_snapshot_event.timestamp),
                send_snapshot_event.peer,
                send_snapshot_event.sequence_number,
                first_seven_base64_chars(&send_snapshot_event.checksum)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveChangesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_changes_event: &ReceiveChangesEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_CHANGES,
                secs_since_unix_epoch(receive_changes_event.timestamp),
                receive_changes_event.connection,
                receive_changes_event.sequence_number,
                receive_changes_event.latency.as_millis()
            )
        };
        Box::new(logger)
    }
}

impl Logger for ChecksumMismatchEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |checksum_mismatch_event: &ChecksumMismatchEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}, {}",
                CHECKSUM_MISMATCH,
                secs_since_unix_epoch(checksum_mismatch_event.timestamp),
                checksum_mismatch_event.connection,
                checksum_mismatch_event.sequence_number,
                first_seven_base64_chars(&checksum_mismatch_event.local_checksum),
                first_seven_base64_chars(&checksum_mismatch_event.received_checksum)
            )
        };
        Box::new(logger)
    }
}

impl Logger for SequenceGapEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |sequence_gap_event: &SequenceGapEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                SEQUENCE_GAP,
                secs_since_unix_epoch(sequence_gap_event.timestamp),
                sequence_gap_event.connection,
                sequence_gap_event.expected,
                sequence_gap_event.received
            )
        };
        Box::new(logger)
    }
}

impl Logger for MalformedChangesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |malformed_changes_event: &MalformedChangesEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                MALFORMED_CHANGES,
                secs_since_unix_epoch(malformed_changes_event.timestamp),
                malformed_changes_event.connection,
                malformed_changes_event.sequence_number,
                malformed_changes_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePongEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_pong_event: &ReceivePongEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_PONG,
                secs_since_unix_epoch(receive_pong_event.timestamp),
                receive_pong_event.connection,
                receive_pong_event.round_trip.as_millis()
            )
        };
        Box::new(logger)
    }
}

impl Logger for RequestSnapshotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |request_snapshot_event: &RequestSnapshotEvent| {
            log::info!(
                "{}, {}, {}, {}",
                REQUEST_SNAPSHOT,
                secs_since_unix_epoch(request_snapshot_event.timestamp),
                request_snapshot_event.connection,
                request_snapshot_event.attempt
            )
        };
        Box::new(logger)
    }
}

impl Logger for InstallSnapshotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |install_snapshot_event: &InstallSnapshotEvent| {
            log::info!(
                "{}, {}, {}, {}",
                INSTALL_SNAPSHOT,
                secs_since_unix_epoch(install_snapshot_event.timestamp),
                install_snapshot_event.connection,
                install_snapshot_event.sequence_number
            )
        };
        Box::new(logger)
    }
}

impl Logger for DiscardSnapshotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |discard_snapshot_event: &DiscardSnapshotEvent| {
            log::info!(
                "{}, {}, {}, {}, {:?}",
                DISCARD_SNAPSHOT,
                secs_since_unix_epoch(discard_snapshot_event.timestamp),
                discard_snapshot_event.connection,
                discard_snapshot_event.sequence_number,
                discard_snapshot_event.last_installed.map(|sequence| sequence.int())
            )
        };
        Box::new(logger)
    }
}

impl Logger for SnapshotTimeoutEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |snapshot_timeout_event: &SnapshotTimeoutEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                SNAPSHOT_TIMEOUT,
                secs_since_unix_epoch(snapshot_timeout_event.timestamp),
                snapshot_timeout_event.connection,
                snapshot_timeout_event.attempt,
                snapshot_timeout_event.timeout.as_millis()
            )
        };
        Box::new(logger)
    }
}

impl Logger for UnrecoverableDesyncEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |unrecoverable_desync_event: &UnrecoverableDesyncEvent| {
            log::error!(
                "{}, {}, {}, {}",
                UNRECOVERABLE_DESYNC,
                secs_since_unix_epoch(unrecoverable_desync_event.timestamp),
                unrecoverable_desync_event.connection,
                unrecoverable_desync_event.attempts
            )
        };
        Box::new(logger)
    }
}

impl Logger for DisconnectEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |disconnect_event: &DisconnectEvent| {
            log::info!(
                "{}, {}, {}",
                DISCONNECT,
                secs_since_unix_epoch(disconnect_event.timestamp),
                disconnect_event.connection
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a checksum by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(checksum: &Checksum) -> String {
    let encoded = checksum.to_base64();
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Timestamps before the epoch are printed as 0.
pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
