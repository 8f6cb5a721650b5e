#![allow(dead_code)]

pub(crate) mod dictionary;

pub(crate) mod logging;

pub(crate) mod network;

pub(crate) mod rooms;
