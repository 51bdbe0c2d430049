// Contact values as registering devices send them
// contact-param = (name-addr / addr-spec) *(SEMI contact-params)
// name-addr     = [ display-name ] LAQUOT addr-spec RAQUOT
// display-name  = *(token LWS) / quoted-string
//
// Push parameters live in the URI (`;app-id=...;pn-voip-tok=...`), some
// clients put them in the URI headers (`?pn-voip-tok=...&...`) or after the
// closing bracket. A parameter value runs until `;`, `>`, `&`, `,`, `?` or
// whitespace.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    combinator::{map, opt, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{pair, preceded, terminated},
};

use super::{quoted_string, semi, sws, token, utf8, ParseResult};

/// One `name[=value]` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
}

/// A parsed Contact value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactValue {
    pub display_name: Option<String>,
    /// Everything between the angle brackets (or the bare addr-spec)
    pub uri: String,
    pub uri_params: Vec<Param>,
    pub uri_headers: Vec<Param>,
    pub header_params: Vec<Param>,
}

impl ContactValue {
    /// First parameter named `name` (case-insensitive), searching the URI
    /// parameters, then the URI headers, then the header parameters
    pub fn param(&self, name: &str) -> Option<&str> {
        self.uri_params
            .iter()
            .chain(&self.uri_headers)
            .chain(&self.header_params)
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_deref())
    }
}

fn is_value_end(c: u8) -> bool {
    matches!(c, b';' | b'>' | b'&' | b',' | b'?') || c.is_ascii_whitespace()
}

fn is_name_end(c: u8) -> bool {
    c == b'=' || is_value_end(c)
}

pub fn param(input: &[u8]) -> ParseResult<Param> {
    map(
        pair(
            take_while1(|c: u8| !is_name_end(c)),
            opt(preceded(tag(b"="), take_while(|c: u8| !is_value_end(c)))),
        ),
        |(name, value): (&[u8], Option<&[u8]>)| Param {
            name: utf8(name),
            value: value.filter(|v| !v.is_empty()).map(utf8),
        },
    )(input)
}

/// Parameters and headers inside a URI: `sip:user@host;a=1;b?c=2&d=3`
pub fn uri_params(input: &[u8]) -> ParseResult<(Vec<Param>, Vec<Param>)> {
    preceded(
        take_till(|c: u8| c == b';' || c == b'?'),
        pair(
            many0(preceded(tag(b";"), param)),
            map(
                opt(preceded(tag(b"?"), separated_list0(tag(b"&"), param))),
                Option::unwrap_or_default,
            ),
        ),
    )(input)
}

fn display_name(input: &[u8]) -> ParseResult<String> {
    alt((
        quoted_string,
        map(recognize(many1(terminated(token, sws))), |name| utf8(name).trim_end().to_string()),
    ))(input)
}

fn name_addr(input: &[u8]) -> ParseResult<(Option<String>, &[u8])> {
    pair(
        opt(terminated(display_name, sws)),
        terminated(
            preceded(tag(b"<"), take_till(|c: u8| c == b'>')),
            opt(tag(b">")),
        ),
    )(input)
}

fn addr_spec(input: &[u8]) -> ParseResult<&[u8]> {
    take_while1(|c: u8| c != b'"' && c != b'<' && c != b',' && !c.is_ascii_whitespace())(input)
}

pub fn contact_value(input: &[u8]) -> ParseResult<ContactValue> {
    let (rest, (display_name, uri)) = preceded(
        sws,
        alt((name_addr, map(addr_spec, |uri| (None, uri)))),
    )(input)?;
    let (rest, header_params) = many0(preceded(semi, param))(rest)?;

    // URI parameters never fail to parse; at worst they are empty
    let (uri_params, uri_headers) = uri_params(uri).map(|(_, parsed)| parsed).unwrap_or_default();

    Ok((
        rest,
        ContactValue {
            display_name,
            uri: utf8(uri).trim().to_string(),
            uri_params,
            uri_headers,
            header_params,
        },
    ))
}
