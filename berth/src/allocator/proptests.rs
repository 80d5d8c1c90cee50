//! Property-based tests for the allocator.
//!
//! Whatever the occupancy and however services are spread over projects,
//! no two active records may share a port and every range-searched port
//! must come from the service type's range.
