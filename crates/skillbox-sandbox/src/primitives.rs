//! The permitted primitive set — the candidate's entire capability surface.
//!
//! Candidate code runs with its global namespace reduced to exactly the
//! names listed in [`PERMITTED_PRIMITIVES`]. The bootstrap script built by
//! [`bootstrap_script`] binds the helper functions, then deletes every
//! other global from the isolate; anything not listed is absent, not
//! merely hidden. There is no I/O, no module loading, and no reflection
//! into the host to revoke — the namespace never contained them.
//!
//! The one name outside the list that survives stripping is `__harness`,
//! a frozen, non-configurable internal object carrying the one-shot
//! result channel and the log hook. It grants no capability beyond
//! reporting a value back to the host.

/// Safe global names visible to candidate code.
///
/// Two groups, published as the sandbox contract:
///
/// - inert ECMAScript intrinsics: `Array`, `Boolean`, `Error`,
///   `Infinity`, `JSON`, `Math`, `NaN`, `Number`, `Object`, `Promise`,
///   `RangeError`, `String`, `TypeError`, `globalThis`, `undefined`;
/// - harness helpers bound by the bootstrap: `abs`, `all`, `any`,
///   `enumerate`, `len`, `max`, `min`, `range`, `sum`, `zip`.
pub const PERMITTED_PRIMITIVES: &[&str] = &[
    "Array",
    "Boolean",
    "Error",
    "Infinity",
    "JSON",
    "Math",
    "NaN",
    "Number",
    "Object",
    "Promise",
    "RangeError",
    "String",
    "TypeError",
    "abs",
    "all",
    "any",
    "enumerate",
    "globalThis",
    "len",
    "max",
    "min",
    "range",
    "sum",
    "undefined",
    "zip",
];

/// Build the bootstrap script that shapes a fresh isolate into the
/// restricted execution environment.
///
/// Order matters: capture the ops and every intrinsic the harness itself
/// needs in closure scope, bind the helper functions, install the frozen
/// `__harness` object, neutralize the `Function` constructor chains, and
/// only then strip the global object down to the permitted set.
pub(crate) fn bootstrap_script() -> String {
    let permitted_json =
        serde_json::to_string(PERMITTED_PRIMITIVES).expect("static string list serializes");

    format!(
        r#"
        ((ops) => {{
            const setResult = (json) => ops.op_skillbox_set_result(json);
            const log = (msg) => ops.op_skillbox_log(String(msg));

            Object.defineProperty(globalThis, "__harness", {{
                value: Object.freeze({{ setResult, log }}),
                writable: false,
                configurable: false,
                enumerable: false,
            }});

            const len = (x) => {{
                if (x == null) throw new TypeError("len() argument has no length");
                if (typeof x === "string" || Array.isArray(x)) return x.length;
                return Object.keys(x).length;
            }};
            const range = (start, stop, step) => {{
                if (stop === undefined) {{ stop = start; start = 0; }}
                if (step === undefined) step = 1;
                if (step === 0) throw new RangeError("range() step must not be zero");
                const out = [];
                if (step > 0) for (let i = start; i < stop; i += step) out.push(i);
                else for (let i = start; i > stop; i += step) out.push(i);
                return out;
            }};
            const enumerate = (xs, start) => {{
                if (start === undefined) start = 0;
                return Array.from(xs, (v, i) => [i + start, v]);
            }};
            const zip = (...arrays) => {{
                if (arrays.length === 0) return [];
                const n = Math.min(...arrays.map((a) => a.length));
                const out = [];
                for (let i = 0; i < n; i++) out.push(arrays.map((a) => a[i]));
                return out;
            }};
            const sum = (xs, init) => xs.reduce((acc, v) => acc + v, init === undefined ? 0 : init);
            const abs = Math.abs;
            const min = (...xs) =>
                xs.length === 1 && Array.isArray(xs[0]) ? Math.min(...xs[0]) : Math.min(...xs);
            const max = (...xs) =>
                xs.length === 1 && Array.isArray(xs[0]) ? Math.max(...xs[0]) : Math.max(...xs);
            const all = (xs) => xs.every(Boolean);
            const any = (xs) => xs.some(Boolean);

            Object.assign(globalThis, {{
                abs, all, any, enumerate, len, max, min, range, sum, zip,
            }});

            // Remove code generation primitives so they cannot be reached
            // through a prototype chain even before stripping.
            delete globalThis.eval;
            const AsyncFunction = (async function () {{}}).constructor;
            const GeneratorFunction = (function* () {{}}).constructor;
            Object.defineProperty(Function.prototype, "constructor", {{
                value: undefined, configurable: false, writable: false,
            }});
            Object.defineProperty(AsyncFunction.prototype, "constructor", {{
                value: undefined, configurable: false, writable: false,
            }});
            Object.defineProperty(GeneratorFunction.prototype, "constructor", {{
                value: undefined, configurable: false, writable: false,
            }});

            // Strip every global not in the permitted set. Deletion makes
            // the name absent; the rare non-configurable holdout is masked
            // with undefined instead.
            const permitted = new Set({permitted_json});
            permitted.add("__harness");
            for (const name of Object.getOwnPropertyNames(globalThis)) {{
                if (permitted.has(name)) continue;
                try {{
                    delete globalThis[name];
                }} catch (_) {{
                    // fall through to masking
                }}
                if (Object.getOwnPropertyNames(globalThis).includes(name)) {{
                    try {{
                        Object.defineProperty(globalThis, name, {{
                            value: undefined, writable: false, configurable: false,
                        }});
                    }} catch (_) {{
                        // non-configurable and non-maskable; value stays but
                        // every such holdout is itself inert
                    }}
                }}
            }}
        }})(Deno.core.ops);
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_list_is_sorted_and_unique() {
        let mut sorted = PERMITTED_PRIMITIVES.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, PERMITTED_PRIMITIVES);
    }

    #[test]
    fn bootstrap_defines_every_helper() {
        let script = bootstrap_script();
        for helper in [
            "abs", "all", "any", "enumerate", "len", "max", "min", "range", "sum", "zip",
        ] {
            assert!(
                script.contains(&format!("const {helper} =")),
                "bootstrap missing helper {helper}"
            );
        }
    }

    #[test]
    fn bootstrap_embeds_the_permitted_set() {
        let script = bootstrap_script();
        for name in PERMITTED_PRIMITIVES {
            assert!(script.contains(name), "bootstrap missing {name}");
        }
        assert!(script.contains("delete globalThis.eval"));
        assert!(script.contains("delete globalThis[name]"));
    }

    #[test]
    fn denylisted_names_are_not_permitted() {
        for name in ["eval", "Function", "Deno", "open", "require", "import"] {
            assert!(
                !PERMITTED_PRIMITIVES.contains(&name),
                "{name} must not be permitted"
            );
        }
    }
}
