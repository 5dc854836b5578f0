//! Text-level helpers for the rewrite engine: argument splitting, call
//! rendering and the balance/diff utilities.

use crate::kb::schema::{ArgScale, RewriteSpec};
use crate::lexer::{CommentStyle, Lexer, TokenKind};

/// Split an argument list body on top-level commas. The input is the text
/// between the call's outer parentheses; nested calls, index brackets and
/// string literals keep their commas.
pub fn split_args(body: &str, style: CommentStyle) -> Vec<&str> {
    let trimmed_all = body.trim();
    if trimmed_all.is_empty() {
        return Vec::new();
    }
    let mut cut_points = Vec::new();
    let mut depth: i32 = 0;
    for token in Lexer::new(body, style).tokens() {
        if token.kind != TokenKind::Symbol {
            continue;
        }
        match token.text {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            "," if depth == 0 => cut_points.push(token.start),
            _ => {}
        }
    }
    let mut args = Vec::with_capacity(cut_points.len() + 1);
    let mut start = 0;
    for cut in cut_points {
        args.push(body[start..cut].trim());
        start = cut + 1;
    }
    args.push(body[start..].trim());
    args
}

/// Render the replacement call expression for a call-pattern rewrite.
/// Returns `None` when the spec references an argument the call does not
/// have; the caller skips the site and records a warning.
pub fn render_call(spec: &RewriteSpec, args: &[&str]) -> Option<String> {
    let order: Vec<usize> = match &spec.arg_order {
        Some(order) => order.clone(),
        None => (0..args.len()).collect(),
    };
    let mut rendered = Vec::with_capacity(order.len());
    for &idx in &order {
        let arg = *args.get(idx)?;
        rendered.push(render_arg(arg, idx, spec.scale.as_ref()));
    }
    Some(format!("{}({})", spec.replacement, rendered.join(", ")))
}

fn render_arg(arg: &str, index: usize, scale: Option<&ArgScale>) -> String {
    match scale {
        Some(s) if s.arg == index => {
            // Parenthesize so the factor binds to the whole expression.
            format!("({}) * {}", arg, s.factor)
        }
        _ => arg.to_string(),
    }
}

/// Net counts of live-code parentheses and brackets. Comments and strings
/// are excluded, so a replacement may not silently change nesting.
pub fn delimiter_balance(src: &str, style: CommentStyle) -> (i64, i64) {
    let mut parens = 0i64;
    let mut brackets = 0i64;
    for token in Lexer::new(src, style).tokens() {
        if token.kind != TokenKind::Symbol {
            continue;
        }
        match token.text {
            "(" => parens += 1,
            ")" => parens -= 1,
            "[" => brackets += 1,
            "]" => brackets -= 1,
            _ => {}
        }
    }
    (parens, brackets)
}

/// Line-pair diff between two texts. Rewrites replace spans inside a line
/// and never add or remove lines, so pairing by index is enough.
pub fn line_diff(old: &str, new: &str) -> String {
    let mut out = String::new();
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let common = old_lines.len().min(new_lines.len());
    for i in 0..common {
        if old_lines[i] != new_lines[i] {
            out.push_str(&format!("-{} {}\n", i + 1, old_lines[i]));
            out.push_str(&format!("+{} {}\n", i + 1, new_lines[i]));
        }
    }
    for (i, line) in old_lines.iter().enumerate().skip(common) {
        out.push_str(&format!("-{} {}\n", i + 1, line));
    }
    for (i, line) in new_lines.iter().enumerate().skip(common) {
        out.push_str(&format!("+{} {}\n", i + 1, line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::schema::PatternKind;

    fn spec(replacement: &str, arg_order: Option<Vec<usize>>, scale: Option<ArgScale>) -> RewriteSpec {
        RewriteSpec {
            pattern: PatternKind::Call,
            replacement: replacement.to_string(),
            arg_order,
            scale,
        }
    }

    #[test]
    fn splits_top_level_commas_only() {
        let args = split_args("a, pow(b, c), arr[i, j], 'x,y'", CommentStyle::StructuredText);
        assert_eq!(args, vec!["a", "pow(b, c)", "arr[i, j]", "'x,y'"]);
    }

    #[test]
    fn empty_body_is_zero_args() {
        assert!(split_args("  ", CommentStyle::StructuredText).is_empty());
    }

    #[test]
    fn renders_reordered_and_dropped_args() {
        let s = spec("newfn", Some(vec![1, 0]), None);
        assert_eq!(
            render_call(&s, &["a", "b", "c"]).unwrap(),
            "newfn(b, a)".to_string()
        );
    }

    #[test]
    fn renders_scaled_arg() {
        let s = spec(
            "newfn",
            None,
            Some(ArgScale {
                arg: 1,
                factor: "1000".to_string(),
            }),
        );
        assert_eq!(
            render_call(&s, &["a", "t + 1"]).unwrap(),
            "newfn(a, (t + 1) * 1000)".to_string()
        );
    }

    #[test]
    fn out_of_range_arg_index_is_rejected() {
        let s = spec("newfn", Some(vec![0, 3]), None);
        assert!(render_call(&s, &["a", "b"]).is_none());
    }

    #[test]
    fn balance_ignores_comments_and_strings() {
        let (p, b) = delimiter_balance(
            "x := f(a[1]); (* unbalanced ((( *) s := ')';",
            CommentStyle::StructuredText,
        );
        assert_eq!(p, 0);
        assert_eq!(b, 0);
    }

    #[test]
    fn diff_pairs_changed_lines() {
        let old = "a\nb\nc\n";
        let new = "a\nB\nc\n";
        assert_eq!(line_diff(old, new), "-2 b\n+2 B\n");
    }
}
