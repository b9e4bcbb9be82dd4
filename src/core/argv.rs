//! Shell-like command string splitting
//!
//! Fields are separated by runs of ASCII whitespace. A double-quote opens a
//! span that keeps whitespace verbatim; inside it `\"` becomes a literal `"`
//! and every other character (backslashes included) passes through untouched.

use crate::error::{WardenError, WardenResult};

/// Split `command` into the argument vector handed to the process backend.
///
/// Quoted spans may be glued to bare text (`a"b c"` is the single field
/// `ab c`) and `""` produces an empty field. Unterminated quotes and commands
/// that contain no field at all are rejected.
pub fn split_command(command: &str) -> WardenResult<Vec<String>> {
    let mut argv = Vec::new();
    let mut field = String::new();
    let mut in_field = false;
    let mut in_quotes = false;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '\\' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match ch {
            '"' => {
                in_quotes = true;
                in_field = true;
            }
            c if c.is_ascii_whitespace() => {
                if in_field {
                    argv.push(std::mem::take(&mut field));
                    in_field = false;
                }
            }
            other => {
                field.push(other);
                in_field = true;
            }
        }
    }

    if in_quotes {
        return Err(WardenError::invalid_command(command, "unterminated double quote"));
    }
    if in_field {
        argv.push(field);
    }
    if argv.is_empty() {
        return Err(WardenError::invalid_command(command, "no program given"));
    }

    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn split(command: &str) -> Vec<String> {
        split_command(command).expect("command should split")
    }

    #[test]
    fn single_word_is_program_only() {
        assert_eq!(split("command"), vec!["command"]);
    }

    #[test]
    fn quoted_span_with_escaped_quote() {
        assert_eq!(
            split("/bin/ping -c \"host wit\\\"h  space\"   notaspace"),
            vec!["/bin/ping", "-c", "host wit\"h  space", "notaspace"]
        );
    }

    #[test_case("  a   b  ", &["a", "b"]; "leading and trailing whitespace")]
    #[test_case("a\tb\nc", &["a", "b", "c"]; "mixed whitespace")]
    #[test_case("a\"b c\"d", &["ab cd"]; "quote glued to bare text")]
    #[test_case("x \"\" y", &["x", "", "y"]; "empty quoted field")]
    #[test_case("\"a\\b\"", &["a\\b"]; "lone backslash in quotes")]
    #[test_case("a\\b c", &["a\\b", "c"]; "backslash outside quotes is literal")]
    #[test_case(
        "bash -c \"trap 'echo trap' SIGINT;while true;do sleep 1;done\"",
        &["bash", "-c", "trap 'echo trap' SIGINT;while true;do sleep 1;done"];
        "single quotes are not special"
    )]
    fn splits(command: &str, expected: &[&str]) {
        assert_eq!(split(command), expected);
    }

    #[test_case("echo \"unterminated"; "open quote")]
    #[test_case("echo \"ends with escape\\\""; "escaped closing quote")]
    #[test_case(""; "empty")]
    #[test_case("   \t "; "whitespace only")]
    fn rejects(command: &str) {
        let err = split_command(command).unwrap_err();
        assert!(matches!(err, WardenError::InvalidCommand { .. }), "{err:?}");
    }

    proptest! {
        #[test]
        fn resplitting_simple_commands_is_stable(words in prop::collection::vec("[a-zA-Z0-9/._=-]{1,12}", 1..8)) {
            let command = words.join("   ");
            let first = split_command(&command).unwrap();
            let second = split_command(&first.join(" ")).unwrap();
            prop_assert_eq!(&first, &words);
            prop_assert_eq!(first, second);
        }
    }
}
