//! Seedlab Notify - Real-time notification client
//!
//! This crate delivers per-user notifications from the seed-testing
//! laboratory portal over a persistent socket or a push stream, with
//! bounded reconnection and shared connections across UI surfaces.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
