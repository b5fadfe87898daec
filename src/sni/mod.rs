//! SNI codec: a reversible serialization of (service, tags) into a single
//! TLS server name.
//!
//! Zone-boundary proxies route cross-zone mTLS traffic without terminating
//! it; the only routing key visible to them is the SNI of the handshake, so
//! the full destination (service plus differentiating tags) is packed into
//! that one string. Encoding must be canonical — the same destination must
//! always produce byte-identical SNIs — and decoding must be its exact
//! inverse, because both ends of a zone boundary recompute these
//! independently on every generation pass.

use crate::config::MATCH_ALL;
use crate::errors::{Error, Result};
use crate::model::tags::{MultiValueTagSet, TagSet};

/// Encode a destination tag set into an SNI string.
///
/// The service tag becomes the leading name; all remaining pairs are
/// appended as `{key=value,...}` in lexicographic key order. A bare
/// service encodes to just the service name.
pub fn encode(tags: &TagSet) -> String {
    let service = tags.service().unwrap_or_default();
    let extra: Vec<String> =
        tags.without_service().map(|(k, v)| format!("{}={}", k, v)).collect();
    if extra.is_empty() {
        service.to_string()
    } else {
        format!("{}{{{}}}", service, extra.join(","))
    }
}

/// Decode an SNI string back into a destination tag set.
///
/// Exactly one opening and one matching closing brace are allowed;
/// missing, duplicated or trailing braces are a decode error. A string
/// with no braces decodes to a bare service tag set.
pub fn decode(sni: &str) -> Result<TagSet> {
    let open_count = sni.matches('{').count();
    let close_count = sni.matches('}').count();

    if open_count == 0 && close_count == 0 {
        return Ok(TagSet::of_service(sni));
    }
    if open_count != 1 || close_count != 1 {
        return Err(Error::sni_parse(sni, "expected exactly one '{' and one '}'"));
    }

    let open = sni.find('{').unwrap_or_default();
    if !sni.ends_with('}') {
        return Err(Error::sni_parse(sni, "tag block must close at end of string"));
    }

    let service = &sni[..open];
    let inner = &sni[open + 1..sni.len() - 1];

    let mut tags = TagSet::of_service(service);
    for pair in inner.split(',') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::sni_parse(sni, format!("tag '{}' is not key=value", pair)))?;
        if key.is_empty() {
            return Err(Error::sni_parse(sni, "empty tag key"));
        }
        tags.insert(key, value);
    }
    Ok(tags)
}

/// Serialize a multi-valued tag set into the form the selector regex
/// matches against: `&key=v1,v2&` segments concatenated in key order.
pub fn serialize(tags: &MultiValueTagSet) -> String {
    let mut out = String::new();
    for (key, values) in tags.iter() {
        let joined: Vec<&str> = values.iter().map(String::as_str).collect();
        out.push_str(&format!("&{}={}&", key, joined.join(",")));
    }
    out
}

/// Build a regular expression matching the [`serialize`]d form of any
/// multi-valued tag set that satisfies the single-valued selector.
///
/// Selector values are escaped literally; the `*` wildcard accepts any
/// value for its key (the key must still be present).
pub fn matching_regex(selector: &TagSet) -> String {
    let mut re = String::from(".*");
    for (key, value) in selector.iter() {
        let expr = if value == MATCH_ALL {
            format!("&{}=[^&]*&", regex::escape(key))
        } else {
            // The value must appear as one element of the comma-joined
            // list, terminated by ',' or the closing '&'.
            format!("&{}=(?:[^&,]*,)*{}[,&]", regex::escape(key), regex::escape(value))
        };
        re.push_str(&expr);
        re.push_str(".*");
    }
    re
}

/// OR-combine the matchers of several selectors into one regex, so a
/// single compiled matcher covers multiple ingress-selector policies.
pub fn matching_regex_or(selectors: &[TagSet]) -> String {
    let alternatives: Vec<String> = selectors.iter().map(matching_regex).collect();
    format!("({})", alternatives.join("|"))
}
