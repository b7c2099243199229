//! Wire codec for one line of the protocol: `[:prefix] command params... [:trailing]`.
//!
//! Parsing is expressed with `nom`, matching the grammar-level parsers used
//! elsewhere in this crate (`parsers.rs`), but works at the top level the
//! dispatcher actually needs: prefix / command / params, not the full
//! per-command grammar.

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, space0, space1},
    combinator::{opt, recognize},
    multi::many0,
    sequence::preceded,
};

/// A command token: either a textual verb (`NICK`, `PRIVMSG`, ...) or a
/// three-digit numeric reply code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Verb(String),
    Numeric(u16),
}

impl Command {
    pub fn as_str_upper(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Command::Verb(v) => std::borrow::Cow::Borrowed(v.as_str()),
            Command::Numeric(n) => std::borrow::Cow::Owned(format!("{n:03}")),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Verb(v) => write!(f, "{v}"),
            Command::Numeric(n) => write!(f, "{n:03}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: Command,
    pub params: Vec<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed message")]
    Malformed,
}

fn not_space(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ' ')(input)
}

fn prefix_parser(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), not_space).parse(input)
}

fn command_parser(input: &str) -> IResult<&str, &str> {
    recognize(many0(nom::character::complete::satisfy(|c| {
        c.is_ascii_alphanumeric()
    })))
    .parse(input)
}

/// Splits the params tail into middle params and an optional trailing param.
/// Mirrors `sid3xyz-slirc-proto`'s hand-rolled loop: collapse runs of spaces,
/// stop at the first `:`-introduced trailing parameter.
fn params_parser(mut rest: &str) -> (&str, Vec<&str>) {
    let mut params = Vec::new();
    loop {
        let trimmed = rest.trim_start_matches(' ');
        if trimmed.is_empty() {
            rest = trimmed;
            break;
        }
        if let Some(after_colon) = trimmed.strip_prefix(':') {
            params.push(after_colon);
            rest = "";
            break;
        }
        let end = trimmed.find(' ').unwrap_or(trimmed.len());
        params.push(&trimmed[..end]);
        rest = &trimmed[end..];
    }
    (rest, params)
}

fn looks_numeric(s: &str) -> Option<u16> {
    if s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Parses one line, already stripped of CR/LF, into a [`Message`].
///
/// Fails with [`CodecError::Malformed`] when the line is empty or the
/// command token is absent.
pub fn parse(line: &str) -> Result<Message, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CodecError::Malformed);
    }

    let (rest, prefix) = opt(prefix_parser)
        .parse(line)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| CodecError::Malformed)?;
    let (rest, _) = space0::<_, nom::error::Error<&str>>(rest).map_err(|_| CodecError::Malformed)?;

    let (rest, command_tok) =
        command_parser(rest).map_err(|_: nom::Err<nom::error::Error<&str>>| CodecError::Malformed)?;
    if command_tok.is_empty() {
        return Err(CodecError::Malformed);
    }

    let (rest, _) = opt(space1::<_, nom::error::Error<&str>>)
        .parse(rest)
        .map_err(|_| CodecError::Malformed)?;

    let (_rest, params) = params_parser(rest);

    let command = match looks_numeric(command_tok) {
        Some(n) => Command::Numeric(n),
        None => Command::Verb(command_tok.to_ascii_uppercase()),
    };

    Ok(Message {
        prefix: prefix.map(str::to_owned),
        command,
        params: params.into_iter().map(str::to_owned).collect(),
    })
}

/// Serialises a message into a single CRLF-terminated wire line.
///
/// If the last parameter is empty, contains a space, or begins with `:`, it
/// is emitted as the trailing parameter (prefixed with `:`).
pub fn serialise(prefix: Option<&str>, command: &Command, params: &[&str]) -> String {
    let mut out = String::new();
    if let Some(p) = prefix {
        out.push(':');
        out.push_str(p);
        out.push(' ');
    }
    out.push_str(&command.as_str_upper());

    if let Some((last, middle)) = params.split_last() {
        for p in middle {
            out.push(' ');
            out.push_str(p);
        }
        out.push(' ');
        if last.is_empty() || last.contains(' ') || last.starts_with(':') {
            out.push(':');
        }
        out.push_str(last);
    }

    out.push_str("\r\n");
    out
}

/// Convenience wrapper used by the hub/endpoint: serialise a [`Message`].
pub fn serialise_message(m: &Message) -> String {
    let params: Vec<&str> = m.params.iter().map(String::as_str).collect();
    serialise(m.prefix.as_deref(), &m.command, &params)
}
