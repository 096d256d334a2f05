//! Rendering traces and error chains for the engine's trace sinks.
//!
//! The same colorized, flat-line `EventRender` shape the original workflow
//! runtime used for its telemetry events is reused here for two different
//! payloads: a policy's [`EvalResult`](crate::expr::EvalResult) trace, and
//! the `source()` chain of a propagated compile-time error. Keeping the
//! rendered shape is what lets a future sink (stdout, a log file, a socket)
//! stay oblivious to which kind of thing it is printing.

use std::error::Error as StdError;

use crate::expr::EvalResult;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta / dark pink
pub const RESET_COLOR: &str = "\x1b[0m";

/// Rendered output for one telemetry item, ready for a sink to print or
/// forward.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    /// Render one policy evaluation's trace (`spec.md` §4.9: traces are
    /// opt-in and produced only when `trace_enabled()` was set before the
    /// evaluation ran).
    fn render_result(&self, route: &str, result: &EvalResult) -> EventRender;

    /// Render a propagated error and its `source()` chain.
    fn render_error(&self, error: &(dyn StdError + 'static)) -> EventRender;
}

pub struct PlainFormatter;

impl TelemetryFormatter for PlainFormatter {
    fn render_result(&self, route: &str, result: &EvalResult) -> EventRender {
        let verdict = if result.ok { "ok" } else { "fail" };
        let line = format!(
            "{LINE_COLOR}[{route}] {verdict}: {}{RESET_COLOR}\n",
            result.trace
        );
        EventRender {
            context: Some(route.to_string()),
            lines: vec![line],
        }
    }

    fn render_error(&self, error: &(dyn StdError + 'static)) -> EventRender {
        let mut lines = vec![format!("{LINE_COLOR}error: {error}{RESET_COLOR}\n")];
        let mut cause = error.source();
        let mut indent = 1;
        while let Some(source) = cause {
            let indent_str = "  ".repeat(indent);
            lines.push(format!("{LINE_COLOR}{indent_str}caused by: {source}{RESET_COLOR}\n"));
            cause = source.source();
            indent += 1;
        }
        EventRender {
            context: Some(format!("{CONTEXT_COLOR}error{RESET_COLOR}")),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::json;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: Inner,
    }

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[test]
    fn renders_a_successful_result() {
        let formatter = PlainFormatter;
        let result = EvalResult::success(Event::new(json!({})), "decoderCheck[/type] matched");
        let render = formatter.render_result("syslog-route", &result);
        assert_eq!(render.context, Some("syslog-route".to_string()));
        assert!(render.join_lines().contains("ok: decoderCheck"));
    }

    #[test]
    fn renders_a_failing_result() {
        let formatter = PlainFormatter;
        let result = EvalResult::failure(Event::new(json!({})), "ruleCheck[/x] did not match");
        let render = formatter.render_result("syslog-route", &result);
        assert!(render.join_lines().contains("fail: ruleCheck"));
    }

    #[test]
    fn renders_an_error_source_chain() {
        let formatter = PlainFormatter;
        let err = Outer { inner: Inner };
        let render = formatter.render_error(&err);
        assert_eq!(render.lines.len(), 2);
        assert!(render.lines[0].contains("outer failure"));
        assert!(render.lines[1].contains("inner failure"));
    }
}
