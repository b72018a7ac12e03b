//! Scenario-based integration tests, one file per end-to-end behavior
//! group.

mod support;

mod claim_fifo;
mod crash_recovery;
mod max_retries;
mod parallel_wave;
mod retry_behavior;
mod success_chain;
mod timeout_enforcement;
