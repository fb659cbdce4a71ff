//! Helpers for driving pairs of sessions over loopback UDP in tests.
