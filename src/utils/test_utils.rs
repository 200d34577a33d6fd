//! Test utilities for machine tests.
