//! Message helpers for matcher failures.

use difference::{Changeset, Difference};

use crate::Value;

/// A line diff between the pretty JSON forms of two containers.
///
/// Returns `None` for primitives, for identical renderings, and when both
/// renderings fit on one line, where the message already shows both values.
pub(crate) fn structural_diff(expected: &Value, actual: &Value) -> Option<String> {
    if !(expected.is_container() && actual.is_container()) {
        return None;
    }
    let expected = expected.pretty();
    let actual = actual.pretty();
    if expected == actual || !(expected.contains('\n') || actual.contains('\n')) {
        return None;
    }

    let changeset = Changeset::new(&expected, &actual, "\n");
    let mut out = String::from("\n\nDifference (- expected, + actual):");
    for diff in &changeset.diffs {
        let (marker, chunk) = match diff {
            Difference::Same(x) => (' ', x),
            Difference::Rem(x) => ('-', x),
            Difference::Add(x) => ('+', x),
        };
        for line in chunk.lines() {
            out.push('\n');
            out.push(marker);
            out.push(' ');
            out.push_str(line);
        }
    }
    Some(out)
}

/// Renders a call's arguments as `[a, b]`.
pub(crate) fn args_list(args: &[Value]) -> String {
    let rendered: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

pub(crate) fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}
