#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Mail composition and delivery
//!
//! Messages are composed with [`domain::mail::MessageBuilder`] and sent
//! through a transport picked by configuration group. Transports are created
//! on first use and shared afterwards by a [`domain::mail::TransportRegistry`].

pub mod domain;
pub mod infrastructure;
