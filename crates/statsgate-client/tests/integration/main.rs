//! Integration tests for statsgate-client
//!
//! Uses wiremock to simulate the statistics API and verifies end-to-end
//! behaviour of the StatsClient: typed operations, caching, 429 handling,
//! admission control and metering.

mod common;

mod test_metering;
mod test_operations;
mod test_throttling;
