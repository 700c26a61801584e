//! deno_core op definitions for the skillbox sandbox.
//!
//! The `#[op2]` macro generates additional public items (v8 function
//! pointers, metadata structs) that cannot carry doc comments, so
//! `missing_docs` is suppressed at the module level.
#![allow(missing_docs)]

use deno_core::op2;
use deno_core::OpState;

/// Log a message from candidate code.
#[op2(fast)]
pub fn op_skillbox_log(#[string] msg: &str) {
    tracing::info!(target: "skillbox::sandbox::js", "{}", msg);
}

/// Store the invocation result envelope in OpState. One-shot by
/// convention: the wrapper script calls it exactly once.
#[op2(fast)]
pub fn op_skillbox_set_result(state: &mut OpState, #[string] json: &str) {
    state.put(InvocationResult(json.to_string()));
}

/// Wrapper for the result envelope stored in OpState.
pub struct InvocationResult(pub String);

deno_core::extension!(skillbox_ext, ops = [op_skillbox_log, op_skillbox_set_result]);
