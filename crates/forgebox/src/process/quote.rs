//! Shell quoting for the stdin fallback path
//!
//! Only used when the executable has to be fed through a shell pipe. Direct
//! execution passes arguments as a raw vector and never goes through here.

/// Quote an argument for a POSIX shell command line.
///
/// Arguments already wrapped in one matching pair of quotes are kept as they
/// are, provided the quotes cannot be broken out of. Everything else is wrapped
/// in double quotes with `"`, `\`, `$` and `` ` `` escaped, so the shell sees
/// the original bytes.
pub fn normalize(arg: &str) -> String {
    if is_safely_quoted(arg) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn is_safely_quoted(arg: &str) -> bool {
    if arg.len() < 2 {
        return false;
    }
    let quote = match arg.as_bytes()[0] {
        q @ (b'\'' | b'"') if arg.as_bytes()[arg.len() - 1] == q => q,
        _ => return false,
    };
    let inner = &arg[1..arg.len() - 1];
    if quote == b'\'' {
        !inner.contains('\'')
    } else {
        !inner.contains(['"', '\\', '$', '`'])
    }
}

/// Build `printf '%s\n' <stdin> | <program> <args...>` with every part quoted
pub fn shell_pipeline(program: &str, args: &[String], stdin: Option<&str>) -> String {
    let mut line = String::new();
    if let Some(input) = stdin {
        line.push_str("printf '%s\\n' ");
        line.push_str(&normalize(input));
        line.push_str(" | ");
    }
    line.push_str(&normalize(program));
    for arg in args {
        line.push(' ');
        line.push_str(&normalize(arg));
    }
    line
}
