//! Shell quoting for log output.

/// Join arguments into a single line that a shell would split back into
/// the same arguments.
pub fn join_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    shell_words::join(args)
}
