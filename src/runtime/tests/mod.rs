//! Tests for the runtime
//!
//! Organized by block family

mod helpers;

mod event_tests;
