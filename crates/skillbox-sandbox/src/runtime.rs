//! Candidate execution inside a fresh V8 isolate.
//!
//! Runs in the worker process. Each invocation gets a brand-new
//! [`JsRuntime`] whose global namespace is reduced to the permitted
//! primitive set before candidate code is evaluated; nothing is reused
//! across invocations.
//!
//! V8 isolates are `!Send`, so callers run this on a dedicated thread
//! with its own single-threaded tokio runtime (the worker binary does
//! exactly that).

use std::sync::atomic::{AtomicBool, Ordering};

use deno_core::{v8, JsRuntime, PollEventLoopOptions, RuntimeOptions};
use serde_json::Value;

use crate::ipc::{RunFailure, WorkerConfig};
use crate::ops::{skillbox_ext, InvocationResult};
use crate::primitives::bootstrap_script;

/// State for the near-heap-limit callback.
struct HeapLimitState {
    handle: v8::IsolateHandle,
    /// Whether the heap limit has been triggered. AtomicBool so the
    /// callback can use a shared `&` reference instead of `&mut`.
    triggered: AtomicBool,
}

/// V8 near-heap-limit callback. Terminates execution and grants 1MB grace
/// for the termination to propagate cleanly.
extern "C" fn near_heap_limit_callback(
    data: *mut std::ffi::c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    // SAFETY: `data` points to the Box<HeapLimitState> allocated in
    // `run_candidate`, which outlives the isolate: V8 only invokes this
    // callback while candidate code is executing, and the Box is not
    // dropped until after the event loop has completed.
    let state = unsafe { &*(data as *const HeapLimitState) };
    if !state.triggered.swap(true, Ordering::SeqCst) {
        state.handle.terminate_execution();
    }
    current_heap_limit + 1024 * 1024
}

/// Create a fresh isolate with the skillbox extension loaded, the heap
/// ceiling set, and the global namespace stripped to the permitted set.
fn create_runtime(max_heap_size: usize) -> Result<JsRuntime, RunFailure> {
    let create_params = v8::CreateParams::default().heap_limits(0, max_heap_size);

    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![skillbox_ext::init()],
        create_params: Some(create_params),
        ..Default::default()
    });

    runtime
        .execute_script("[skillbox:bootstrap]", bootstrap_script())
        .map_err(|e| RunFailure::Runtime {
            message: format!("bootstrap failed: {e}"),
        })?;

    Ok(runtime)
}

/// Execute one candidate invocation to completion or failure.
///
/// The produced value, or any failure raised by candidate code, comes
/// back as a value — a thrown exception never propagates past this
/// function. Only OS-enforced limits (CPU rlimit, address-space rlimit)
/// can terminate the process instead of returning here.
pub async fn run_candidate(
    config: &WorkerConfig,
    source: &str,
    args: &[Value],
) -> Result<Value, RunFailure> {
    let mut runtime = create_runtime(config.max_heap_size)?;

    let heap_state = Box::new(HeapLimitState {
        handle: runtime.v8_isolate().thread_safe_handle(),
        triggered: AtomicBool::new(false),
    });
    runtime.v8_isolate().add_near_heap_limit_callback(
        near_heap_limit_callback,
        &*heap_state as *const HeapLimitState as *mut std::ffi::c_void,
    );

    let args_json = serde_json::to_string(args).map_err(|e| RunFailure::Runtime {
        message: format!("argument serialization failed: {e}"),
    })?;

    // Evaluate the candidate expression, invoke it with the test
    // arguments, and hand the envelope to the one-shot result op. Any
    // throw lands in the catch arm and becomes an error envelope.
    let wrapped = format!(
        r#"
        (async () => {{
            try {{
                const __candidate = ({source});
                if (typeof __candidate !== "function") {{
                    throw new TypeError("candidate source did not evaluate to a function");
                }}
                const __args = {args_json};
                const __value = await __candidate(...__args);
                __harness.setResult(
                    JSON.stringify({{ ok: __value === undefined ? null : __value }})
                );
            }} catch (e) {{
                __harness.setResult(
                    JSON.stringify({{ error: (e && e.message) ? e.message : String(e) }})
                );
            }}
        }})();
        "#
    );

    let exec_error = match runtime.execute_script("[skillbox:invoke]", wrapped) {
        Ok(_) => {
            // Drive the event loop so async candidates resolve. Wall-clock
            // enforcement lives in the parent; CPU runaways are bounded by
            // RLIMIT_CPU.
            match runtime
                .run_event_loop(PollEventLoopOptions::default())
                .await
            {
                Ok(()) => None,
                Err(e) => Some(e.to_string()),
            }
        }
        Err(e) => Some(e.to_string()),
    };

    if heap_state.triggered.load(Ordering::SeqCst) {
        return Err(RunFailure::MemoryExceeded);
    }

    if let Some(message) = exec_error {
        return Err(RunFailure::Runtime { message });
    }

    let result_str = {
        let state = runtime.op_state();
        let state = state.borrow();
        state
            .try_borrow::<InvocationResult>()
            .map(|r| r.0.clone())
            .ok_or_else(|| RunFailure::Runtime {
                message: "candidate finished without reporting a result".into(),
            })?
    };

    if result_str.len() > config.max_output_size {
        return Err(RunFailure::OutputTooLarge {
            max: config.max_output_size,
        });
    }

    let envelope: Value = serde_json::from_str(&result_str).map_err(|e| RunFailure::Runtime {
        message: format!("result envelope parse failed: {e}"),
    })?;

    if let Some(error) = envelope.get("error") {
        return Err(RunFailure::Runtime {
            message: error.as_str().unwrap_or("unknown error").to_string(),
        });
    }

    Ok(envelope.get("ok").cloned().unwrap_or(Value::Null))
}
