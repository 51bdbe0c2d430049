//! nom parsers for the header values push-wake reads
//!
//! Two grammars are needed: the Contact value a registering device sends
//! (display name, URI and the push parameters inside it) and the
//! `WWW-Authenticate` challenge of a push gateway using Digest auth.

pub mod auth;
pub mod contact;

use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_while1},
    combinator::{map_res, recognize},
    multi::{fold_many0, many0, many1},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use std::str;

// Type alias for parser result
pub type ParseResult<'a, O> = IResult<&'a [u8], O>;

/// SP or HTAB
pub fn wsp(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(alt((tag(b" "), tag(b"\t"))))(input)
}

/// Mandatory whitespace (header values reach us already unfolded)
pub fn lws(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(many1(wsp))(input)
}

/// Optional whitespace
pub fn sws(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(many0(wsp))(input)
}

pub fn comma(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b","), sws)))(input)
}

pub fn equal(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b"="), sws)))(input)
}

pub fn semi(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b";"), sws)))(input)
}

// token = 1*(alphanum / "-" / "." / "!" / "%" / "*" / "_" / "+" / "`" / "'" / "~")
fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"-.!%*_+`'~".contains(&c)
}

pub fn token(input: &[u8]) -> ParseResult<&[u8]> {
    take_while1(is_token_char)(input)
}

pub fn token_string(input: &[u8]) -> ParseResult<String> {
    map_res(token, |b| str::from_utf8(b).map(String::from))(input)
}

/// `"..."` with `\x` escapes resolved
///
/// quoted-string = DQUOTE *(qdtext / quoted-pair) DQUOTE
pub fn quoted_string(input: &[u8]) -> ParseResult<String> {
    delimited(
        tag(b"\""),
        map_res(
            fold_many0(
                alt((
                    take_while1(|c: u8| c != b'"' && c != b'\\'),
                    preceded(tag(b"\\"), take(1usize)),
                )),
                Vec::new,
                |mut acc: Vec<u8>, chunk: &[u8]| {
                    acc.extend_from_slice(chunk);
                    acc
                },
            ),
            String::from_utf8,
        ),
        tag(b"\""),
    )(input)
}

pub(crate) fn utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
