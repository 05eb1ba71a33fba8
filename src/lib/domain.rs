//! Domain model

pub mod mail;
