// SPDX-License-Identifier: Apache-2.0

//! Exception triage: turns an E-proto error-data EDN payload into the
//! single human-readable message the original tool prints on stderr.

use edn::Value;

const CORE_PREFIX: &str = "clojure.";
const PLACEHOLDER_SOURCES: &[&str] = &["NO_SOURCE_FILE", "NO_SOURCE_PATH", ""];

struct TraceEntry<'a> {
    class: &'a str,
    method: &'a str,
    file: &'a str,
    line: i64,
}

#[derive(Default)]
struct Markers {
    line: Option<i64>,
    column: Option<i64>,
    source: Option<String>,
    symbol: Option<String>,
}

/// Formats `payload` (the EDN value carried in a `:ret` response whose
/// `exception` flag is true) into the one message the original prints.
pub fn format(payload: &Value) -> String {
    let phase = payload
        .get("phase")
        .and_then(Value::as_keyword)
        .unwrap_or("execution");

    let via = payload.get("via").and_then(Value::as_vec).unwrap_or(&[]);
    // Markers come from the outermost wrapper (via[0]); class and message
    // come from the root cause (via[len-1]) so a wrapped exception reports
    // what actually failed, not the wrapper around it.
    let first_via = via.first();
    let root_via = via.last();

    let class = root_via
        .and_then(|v| v.get("type"))
        .and_then(Value::as_symbol)
        .unwrap_or("Exception");
    let message = root_via
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let mut markers = first_via
        .and_then(|v| v.get("data"))
        .map(extract_markers)
        .unwrap_or_default();

    let trace = payload.get("trace").and_then(Value::as_vec).unwrap_or(&[]);
    if let Some(entry) = find_first_non_core_entry(trace) {
        if markers.symbol.is_none() {
            markers.symbol = Some(format!("{}/{}", entry.class, entry.method));
        }
        if markers.source.is_none() && !is_placeholder_source(entry.file) {
            markers.source = Some(entry.file.to_string());
        }
        if markers.line.is_none() {
            markers.line = Some(entry.line);
        }
    }

    let loc = render_location(&markers);
    let class_segment = if class_simple_name(class) == "Exception" || class_simple_name(class) == "RuntimeException" {
        None
    } else {
        Some(class_simple_name(class))
    };
    let symbol_segment = markers.symbol.as_deref();

    let header = render_template(phase, class_segment.as_deref(), symbol_segment, &loc);
    format!("{header}\n{message}")
}

fn render_template(phase: &str, class: Option<&str>, symbol: Option<&str>, loc: &str) -> String {
    let class_part = class.map(|c| format!("({c}) ")).unwrap_or_default();
    let sym_space = symbol.map(|s| format!("{s} ")).unwrap_or_default();

    match phase {
        "read-source" => format!("Syntax error reading source at ({loc})."),
        "macro-syntax-check" => format!("Syntax error macroexpanding {sym_space}at ({loc})."),
        "macroexpansion" => format!("Unexpected error {class_part}macroexpanding {sym_space}at ({loc})."),
        "compile-syntax-check" => format!("Syntax error {class_part}compiling {sym_space}at ({loc})."),
        "compilation" => format!("Unexpected error {class_part}compiling {sym_space}at ({loc})."),
        "read-eval-result" => format!("Error reading eval result {class_part}at {sym_space}({loc})."),
        "print-eval-result" => format!("Error printing return value {class_part}at {sym_space}({loc})."),
        _ => format!("Execution error {class_part}at {sym_space}({loc})."),
    }
}

fn class_simple_name(class: &str) -> String {
    class.rsplit('.').next().unwrap_or(class).to_string()
}

fn is_placeholder_source(s: &str) -> bool {
    PLACEHOLDER_SOURCES.contains(&s)
}

fn find_first_non_core_entry(trace: &[Value]) -> Option<TraceEntry<'_>> {
    trace.iter().find_map(|entry| {
        let fields = entry.as_vec()?;
        let class = fields.first()?.as_symbol()?;
        if class.starts_with(CORE_PREFIX) {
            return None;
        }
        let method = fields.get(1)?.as_symbol()?;
        let file = fields.get(2)?.as_str().unwrap_or("");
        let line = fields.get(3)?.as_int().unwrap_or(1);
        Some(TraceEntry {
            class,
            method,
            file,
            line,
        })
    })
}

fn extract_markers(data: &Value) -> Markers {
    let mut markers = Markers::default();
    if let Value::Map(entries) = data {
        for (k, v) in entries {
            let Some(key) = k.as_keyword() else { continue };
            match key {
                "clojure.error/line" => markers.line = v.as_int(),
                "clojure.error/column" => markers.column = v.as_int(),
                "clojure.error/source" => markers.source = v.as_str().map(str::to_string),
                "clojure.error/symbol" => markers.symbol = v.as_symbol().map(str::to_string),
                _ => {}
            }
        }
    }
    markers
}

fn render_location(markers: &Markers) -> String {
    let source = markers
        .source
        .as_deref()
        .filter(|s| !is_placeholder_source(s))
        .unwrap_or("REPL");
    let line = markers.line.unwrap_or(1);
    match markers.column {
        Some(col) if col != 0 => format!("{source}:{line}:{col}"),
        _ => format!("{source}:{line}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(s: &str) -> Value {
        Value::Keyword(s.to_string())
    }
    fn sym(s: &str) -> Value {
        Value::Symbol(s.to_string())
    }
    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn formats_an_execution_error_with_a_non_core_trace_entry() {
        let payload = Value::Map(vec![
            (
                kw("via"),
                Value::Vector(vec![Value::Map(vec![
                    (kw("type"), sym("java.lang.ArithmeticException")),
                    (kw("message"), s("Divide by zero")),
                ])]),
            ),
            (
                kw("trace"),
                Value::Vector(vec![Value::Vector(vec![
                    sym("clojure.lang.Numbers"),
                    sym("divide"),
                    s("Numbers.java"),
                    Value::Int(188),
                ])]),
            ),
            (kw("phase"), kw("execution")),
        ]);

        let message = format(&payload);
        assert_eq!(
            message,
            "Execution error (ArithmeticException) at clojure.lang.Numbers/divide (Numbers.java:188).\nDivide by zero"
        );
    }

    #[test]
    fn omits_class_segment_for_plain_exception() {
        let payload = Value::Map(vec![
            (
                kw("via"),
                Value::Vector(vec![Value::Map(vec![
                    (kw("type"), sym("java.lang.Exception")),
                    (kw("message"), s("boom")),
                ])]),
            ),
            (kw("trace"), Value::Vector(vec![])),
            (kw("phase"), kw("execution")),
        ]);
        let message = format(&payload);
        assert!(message.starts_with("Execution error at "));
    }

    #[test]
    fn uses_the_root_cause_for_class_and_message_on_a_wrapped_exception() {
        let payload = Value::Map(vec![
            (
                kw("via"),
                Value::Vector(vec![
                    Value::Map(vec![
                        (kw("type"), sym("clojure.lang.ExceptionInfo")),
                        (kw("message"), s("wrapper failed")),
                    ]),
                    Value::Map(vec![
                        (kw("type"), sym("java.lang.ArithmeticException")),
                        (kw("message"), s("Divide by zero")),
                    ]),
                ]),
            ),
            (kw("trace"), Value::Vector(vec![])),
            (kw("phase"), kw("execution")),
        ]);

        let message = format(&payload);
        assert!(message.starts_with("Execution error (ArithmeticException) at "));
        assert!(message.ends_with("Divide by zero"));
    }

    #[test]
    fn defaults_phase_to_execution_when_missing() {
        let payload = Value::Map(vec![(
            kw("via"),
            Value::Vector(vec![Value::Map(vec![
                (kw("type"), sym("clojure.lang.ExceptionInfo")),
                (kw("message"), s("bad input")),
            ])]),
        )]);
        let message = format(&payload);
        assert!(message.starts_with("Execution error (ExceptionInfo) at "));
    }
}
