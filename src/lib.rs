#![allow(clippy::module_name_repetitions)]
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![deny(unused_must_use)]

//! Core of a multi-asset brokerage trading backend: a real-time market-data
//! fan-out hub coupled to an event-driven order-matching and
//! position-management engine.
//!
//! Components, leaf to root: [`session`] and [`marketdata::providers`] feed
//! [`marketdata`], which feeds the [`marketdata::hub::Hub`] and the
//! [`matcher`], which in turn drives [`positions`]. [`api`] exposes all of
//! it over HTTP and a single `/ws` upgrade. [`app::build`] wires the whole
//! graph together from a [`config::Config`].

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod marketdata;
pub mod matcher;
pub mod model;
pub mod positions;
pub mod prelude;
pub mod session;
pub mod shutdown;
pub mod supervisor;
