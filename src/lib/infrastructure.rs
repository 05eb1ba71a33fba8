//! Infrastructure

pub mod mail;
