// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Routing of Cloud Foundry firehose envelopes to an HTTP collector.
//!
//! An [`envelope::Envelope`] is normalized into an [`events::Event`], annotated with envelope
//! metadata, operator extra fields and (for application events) cached application data, run
//! through a [`filters::FilterChain`] and finally posted as a flat JSON object by a
//! [`forwarder::Forwarder`]. [`router::EventRouter`] drives the pipeline and keeps
//! [`stats::Stats`] counters for every outcome.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod caching;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod extra_fields;
pub mod filters;
pub mod forwarder;
pub mod router;
pub mod selection;
pub mod stats;

pub use router::{EventRouter, RouteOutcome};
