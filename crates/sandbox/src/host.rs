//! Host-exported primitives callable from sandboxed script (spec §4.4):
//! `log`, `error`, `sleep`, `now`, base64 encode/decode. `JSON.parse` /
//! `JSON.stringify` are native QuickJS builtins and need no host wiring;
//! everything else capability-sensitive (filesystem, network, subprocess,
//! thread spawn, host-class lookup) is simply never bound, so script has
//! no path to reach it.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rquickjs::{Ctx, Function, Result as JsResult};

pub fn install(ctx: &Ctx<'_>, captured_output: Arc<Mutex<Vec<String>>>) -> JsResult<()> {
    let globals = ctx.globals();

    let log_sink = captured_output.clone();
    globals.set(
        "log",
        Function::new(ctx.clone(), move |msg: String| {
            log_sink.lock().unwrap().push(msg);
        }),
    )?;

    let error_sink = captured_output.clone();
    globals.set(
        "error",
        Function::new(ctx.clone(), move |msg: String| {
            error_sink.lock().unwrap().push(format!("[error] {msg}"));
        }),
    )?;

    globals.set(
        "now",
        Function::new(ctx.clone(), || -> i64 {
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
        }),
    )?;

    // Invocations are a single blocking step bounded by the wall-clock
    // timeout (spec §4.4 Suspension points) — `sleep` never actually
    // parks the worker thread, it just burns wall-clock budget.
    globals.set(
        "sleep",
        Function::new(ctx.clone(), |ms: i64| {
            if ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(ms as u64));
            }
        }),
    )?;

    globals.set(
        "base64Encode",
        Function::new(ctx.clone(), |s: String| -> String { BASE64.encode(s) }),
    )?;

    globals.set(
        "base64Decode",
        Function::new(ctx.clone(), |s: String| -> String {
            BASE64.decode(s).ok().and_then(|b| String::from_utf8(b).ok()).unwrap_or_default()
        }),
    )?;

    Ok(())
}
