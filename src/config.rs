/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Operator-facing configuration, split into component configurations before use.

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::cascade::generation::GenerationConfiguration;
use crate::event_bus::EventHandlers;
use crate::sync::coordinator::ResyncConfiguration;

/// Parameters of a match: board geometry, generation policy, and resync behaviour.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. Every setter is optional; see each field for
    its default.
"))]
pub struct Configuration {
    #[builder(default = 5, setter(doc = "Set the number of columns. Defaults to 5."))]
    pub board_width: u32,
    #[builder(default = 5, setter(doc = "Set the number of rows. Defaults to 5."))]
    pub board_height: u32,
    #[builder(
        default = 10,
        setter(doc = "Set the number of distinct words a new board must support. Defaults to 10.")
    )]
    pub min_words: usize,
    #[builder(
        default = 20,
        setter(doc = "Set how many boards to draw before giving up on generation. Defaults to 20.")
    )]
    pub max_generation_attempts: u32,
    #[builder(default = 3, setter(doc = "Set the shortest word that counts. Defaults to 3."))]
    pub min_word_length: usize,
    #[builder(default = 5, setter(doc = "Set the longest word searched for. Defaults to 5."))]
    pub max_word_length: usize,
    #[builder(
        default = Duration::from_secs(5),
        setter(doc = "Set how long to wait for the first snapshot response. Defaults to 5 seconds.")
    )]
    pub snapshot_timeout: Duration,
    #[builder(
        default = 3,
        setter(doc = "Set how many times a snapshot request is retried. Defaults to 3.")
    )]
    pub max_snapshot_retries: u32,
    #[builder(default = true, setter(doc = "Enable logging? Defaults to true."))]
    pub log_events: bool,
}

impl Configuration {
    /// Handlers for an [`EventBus`](crate::event_bus::EventBus), with the default loggers
    /// registered if logging is enabled.
    pub fn event_handlers(&self) -> EventHandlers {
        EventHandlers::new(self.log_events)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Into<(GenerationConfiguration, ResyncConfiguration)> for Configuration {
    fn into(self) -> (GenerationConfiguration, ResyncConfiguration) {
        let generation_config = GenerationConfiguration {
            width: self.board_width,
            height: self.board_height,
            min_words: self.min_words,
            max_attempts: self.max_generation_attempts,
            min_word_length: self.min_word_length,
            max_word_length: self.max_word_length,
        };
        let resync_config = ResyncConfiguration {
            snapshot_timeout: self.snapshot_timeout,
            max_snapshot_retries: self.max_snapshot_retries,
        };
        (generation_config, resync_config)
    }
}
