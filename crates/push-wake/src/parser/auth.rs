// WWW-Authenticate challenges (RFC 7235 section 2.1, RFC 7616)
// challenge  = auth-scheme [ 1*SP #auth-param ]
// auth-param = token BWS "=" BWS ( token / quoted-string )

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    combinator::{map, opt},
    multi::separated_list0,
    sequence::{preceded, separated_pair, terminated},
};

use super::{comma, equal, lws, quoted_string, sws, token_string, ParseResult};

/// One `name=value` pair of a challenge, quotes and escapes removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParam {
    pub name: String,
    pub value: String,
}

pub fn auth_param(input: &[u8]) -> ParseResult<AuthParam> {
    map(
        separated_pair(token_string, equal, alt((quoted_string, token_string))),
        |(name, value)| AuthParam { name, value },
    )(input)
}

pub fn auth_params(input: &[u8]) -> ParseResult<Vec<AuthParam>> {
    terminated(separated_list0(comma, auth_param), opt(comma))(input)
}

/// Parameters of a `Digest` challenge; the scheme matches case-insensitively
pub fn digest_challenge(input: &[u8]) -> ParseResult<Vec<AuthParam>> {
    preceded(scheme(b"Digest"), auth_params)(input)
}

fn scheme<'a>(name: &'static [u8]) -> impl FnMut(&'a [u8]) -> ParseResult<'a, &'a [u8]> {
    preceded(sws, terminated(tag_no_case(name), lws))
}

/// Case-insensitive lookup of one parameter
pub fn find_param<'p>(params: &'p [AuthParam], name: &str) -> Option<&'p str> {
    params
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| p.value.as_str())
}
