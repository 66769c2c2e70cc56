//! Behavior tests for the relay core, driven through scripted collaborators.
//!
//! Aggregation timing runs against the real clock with the short window from
//! [`test_config`](super::test_helpers::test_config); assertions stick to
//! counts and orderings rather than tight elapsed bounds.


pub(crate) use super::test_helpers::*;
pub(crate) use crate::error::Error;
pub(crate) use crate::types::Event;
