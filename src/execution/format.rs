//! Shell-safe command formatting.

use crate::error::SyError;
use crate::Result;

/// Placeholder token replaced by an escaped argument.
pub const PLACEHOLDER: &str = "{}";

/// Escape the characters a POSIX shell would split or expand on.
///
/// Space, tab, single quote, double quote and dollar sign are prefixed with
/// a backslash. Everything else is left untouched.
pub fn shell_escape(arg: &str) -> String {
    let mut escaped = String::with_capacity(arg.len());
    for c in arg.chars() {
        if matches!(c, ' ' | '\t' | '\'' | '"' | '$') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Substitute each `{}` in `template` with the matching shell-escaped
/// argument.
///
/// ```
/// let cmd = sy::execution::format_cmd("ls -l {} | grep {} | wc", &["foo 1", "bar$baz"]).unwrap();
/// assert_eq!(cmd, r"ls -l foo\ 1 | grep bar\$baz | wc");
/// ```
///
/// A literal `{}` in the command must be escaped (`\{\}`) or passed as an
/// argument. Arguments are inserted verbatim, so an argument containing
/// `{}` or `%` is never treated as a placeholder.
pub fn format_cmd<S: AsRef<str>>(template: &str, args: &[S]) -> Result<String> {
    let expected = template.matches(PLACEHOLDER).count();
    if expected != args.len() {
        return Err(SyError::ArgumentCountMismatch {
            template: template.to_string(),
            expected,
            given: args.len(),
        });
    }

    let mut formatted = String::with_capacity(template.len());
    let mut pieces = template.split(PLACEHOLDER);
    if let Some(first) = pieces.next() {
        formatted.push_str(first);
    }
    for (piece, arg) in pieces.zip(args) {
        formatted.push_str(&shell_escape(arg.as_ref()));
        formatted.push_str(piece);
    }
    Ok(formatted)
}
