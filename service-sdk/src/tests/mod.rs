//! Mock-server tests for the service SDK
//!
//! These tests run the real `ServiceClient` against WireMock servers.
