//! Argument quoting for command interpreters.
//!
//! A single quote-if-needed routine parameterized by the interpreter's
//! dangerous-character set and escape convention.
//!
//! Both `cmd.exe` dialects wrap the argument in double quotes and double any
//! embedded `"`, which the MSVC runtime reads back as one literal quote.
//! Inside quotes `cmd.exe` takes `^` literally, so carets are left alone.
//! Only `%` differs:
//!
//! - [`ShellDialect::Cmd`] (`cmd.exe /C` command lines) has no `%%` escape.
//!   Each `%` is moved outside the quotes as `"^%"`, where the caret stops
//!   variable expansion.
//! - [`ShellDialect::Batch`] (`.bat` files) doubles it to `%%`.

/// Command interpreter whose quoting rules an argument is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellDialect {
    /// A `cmd.exe /C` command line.
    Cmd,
    /// A line of a `.bat` file run by `cmd.exe`.
    Batch,
    /// POSIX `sh`. Used to render command lines in diagnostics.
    Posix,
}

impl ShellDialect {
    /// Characters that force an argument to be quoted.
    pub fn dangerous_chars(&self) -> &'static [char] {
        match self {
            ShellDialect::Cmd | ShellDialect::Batch => {
                &[' ', '\t', '&', '|', '<', '>', '^', '%', '(', ')', '"']
            }
            ShellDialect::Posix => &[
                ' ', '\t', '\n', '&', '|', '<', '>', ';', '(', ')', '$', '`', '\\', '"', '\'', '*',
                '?', '[', ']', '#', '~', '!', '{', '}',
            ],
        }
    }

    fn needs_quoting(&self, arg: &str) -> bool {
        arg.is_empty() || arg.contains(self.dangerous_chars())
    }

    fn escape(&self, arg: &str) -> String {
        let percent = match self {
            ShellDialect::Cmd => "\"^%\"",
            ShellDialect::Batch => "%%",
            ShellDialect::Posix => return format!("'{}'", arg.replace('\'', r"'\''")),
        };

        let mut out = String::with_capacity(arg.len() + 2);
        out.push('"');
        for c in arg.chars() {
            match c {
                '"' => out.push_str("\"\""),
                '%' => out.push_str(percent),
                other => out.push(other),
            }
        }
        out.push('"');
        out
    }
}

/// Quote `arg` for `dialect` when it contains shell-significant characters.
///
/// Arguments without any such character are returned unchanged.
pub fn quote_if_needed(arg: &str, dialect: ShellDialect) -> String {
    if dialect.needs_quoting(arg) {
        dialect.escape(arg)
    } else {
        arg.to_string()
    }
}

/// Quote every argument and join them with single spaces.
pub fn join_quoted<I, S>(args: I, dialect: ShellDialect) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| quote_if_needed(a.as_ref(), dialect))
        .collect::<Vec<_>>()
        .join(" ")
}
