use std::borrow::Cow;

use num_bigint::BigInt;

use super::{
    node::{Asn1Node, TaggedContent},
    tag::{universal, Tag, TagClass},
    MalformedEncoding,
};

/// Nesting limit for indefinite-length scanning and node decoding.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingRules {
    /// Basic Encoding Rules: indefinite lengths and constructed strings are
    /// accepted.
    Ber,
    /// Distinguished Encoding Rules: definite lengths only.
    Der,
}

/// Forward-only cursor over a BER/DER buffer.
///
/// Every `read_*` call consumes exactly one element of the current scope.
/// Structured reads (`read_sequence`, `read_set_of`, `read_tagged`) return a
/// new reader scoped to the element's content; the parent cursor moves past
/// the whole element.
#[derive(Debug, Clone)]
pub struct Asn1Reader<'a> {
    data: &'a [u8],
    rules: EncodingRules,
}

/// One element split off the front of a buffer.
struct Element<'a> {
    tag: Tag,
    content: &'a [u8],
    /// Header + content (+ end-of-contents octets for indefinite lengths).
    total_len: usize,
}

impl<'a> Asn1Reader<'a> {
    pub fn new(data: &'a [u8], rules: EncodingRules) -> Self {
        Self { data, rules }
    }

    pub fn rules(&self) -> EncodingRules {
        self.rules
    }

    /// Whether unconsumed data remains in the current scope.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Returns the next element's tag without consuming it.
    pub fn peek_tag(&self) -> Result<Tag, MalformedEncoding> {
        Tag::decode(self.data)
            .map(|(tag, _)| tag)
            .ok_or_else(|| self.eof("an identifier octet"))
    }

    pub fn read_sequence(&mut self) -> Result<Asn1Reader<'a>, MalformedEncoding> {
        let element = self.read_expected(Tag::SEQUENCE)?;
        Ok(self.scoped(element.content))
    }

    pub fn read_set_of(&mut self) -> Result<Asn1Reader<'a>, MalformedEncoding> {
        let element = self.read_expected(Tag::SET)?;
        Ok(self.scoped(element.content))
    }

    /// Reads an explicitly tagged context-specific wrapper (`[n]`) and returns
    /// a reader over the wrapped element(s).
    pub fn read_tagged(&mut self, number: u32) -> Result<Asn1Reader<'a>, MalformedEncoding> {
        let element = self.read_expected(Tag::context_specific(number, true))?;
        Ok(self.scoped(element.content))
    }

    pub fn read_integer(&mut self) -> Result<BigInt, MalformedEncoding> {
        let element = self.read_expected(Tag::INTEGER)?;
        decode_integer(element.content)
    }

    /// Reads an OBJECT IDENTIFIER as a dotted-decimal string.
    pub fn read_object_identifier(&mut self) -> Result<String, MalformedEncoding> {
        let element = self.read_expected(Tag::OBJECT_IDENTIFIER)?;
        decode_object_identifier(element.content)
    }

    /// Reads an OCTET STRING. Constructed (segmented) strings are only
    /// accepted under BER and are returned concatenated.
    pub fn read_octet_string(&mut self) -> Result<Cow<'a, [u8]>, MalformedEncoding> {
        self.read_octet_string_at_depth(0)
    }

    fn read_octet_string_at_depth(
        &mut self,
        depth: usize,
    ) -> Result<Cow<'a, [u8]>, MalformedEncoding> {
        if depth > MAX_DEPTH {
            return Err(MalformedEncoding::new(
                format!("OCTET STRING segment nesting <= {MAX_DEPTH}"),
                "deeper nesting",
            ));
        }
        let tag = self.peek_tag()?;
        if !tag.has_same_class_and_number(&Tag::OCTET_STRING) {
            return Err(MalformedEncoding::new(Tag::OCTET_STRING, tag));
        }
        let element = self.take_element()?;
        if !tag.constructed {
            return Ok(Cow::Borrowed(element.content));
        }
        if self.rules == EncodingRules::Der {
            return Err(MalformedEncoding::new(
                "primitive OCTET STRING under DER",
                tag,
            ));
        }
        let mut joined = Vec::new();
        let mut segments = self.scoped(element.content);
        while segments.has_data() {
            joined.extend_from_slice(&segments.read_octet_string_at_depth(depth + 1)?);
        }
        Ok(Cow::Owned(joined))
    }

    /// Reads a character string of the given universal type (e.g.
    /// [`universal::UTF8_STRING`]) and decodes it as UTF-8.
    pub fn read_character_string(&mut self, number: u32) -> Result<String, MalformedEncoding> {
        let expected = Tag::universal(number, false);
        let element = self.read_expected(expected)?;
        String::from_utf8(element.content.to_vec())
            .map_err(|e| MalformedEncoding::new(format!("UTF-8 content for {expected}"), e))
    }

    /// Decodes the next element into a node tree.
    pub fn read_node(&mut self) -> Result<Asn1Node<'a>, MalformedEncoding> {
        self.read_node_at_depth(0)
    }

    fn read_node_at_depth(&mut self, depth: usize) -> Result<Asn1Node<'a>, MalformedEncoding> {
        if depth > MAX_DEPTH {
            return Err(MalformedEncoding::new(
                format!("nesting depth <= {MAX_DEPTH}"),
                "deeper nesting",
            ));
        }
        let tag = self.peek_tag()?;
        match (tag.class, tag.number) {
            (TagClass::Universal, universal::SEQUENCE) => {
                let inner = self.read_sequence()?;
                Ok(Asn1Node::Sequence(inner.read_children(depth)?))
            }
            (TagClass::Universal, universal::SET) => {
                let inner = self.read_set_of()?;
                Ok(Asn1Node::Set(inner.read_children(depth)?))
            }
            (TagClass::Universal, universal::INTEGER) => Ok(Asn1Node::Integer(self.read_integer()?)),
            (TagClass::Universal, universal::OCTET_STRING) => {
                Ok(Asn1Node::OctetString(self.read_octet_string_at_depth(depth)?))
            }
            (TagClass::Universal, universal::OBJECT_IDENTIFIER) => {
                Ok(Asn1Node::ObjectIdentifier(self.read_object_identifier()?))
            }
            (
                TagClass::Universal,
                universal::UTF8_STRING | universal::PRINTABLE_STRING | universal::IA5_STRING,
            ) if !tag.constructed => Ok(Asn1Node::CharacterString(
                self.read_character_string(tag.number)?,
            )),
            (TagClass::ContextSpecific, number) => {
                let element = self.take_element()?;
                let content = if tag.constructed {
                    TaggedContent::Nested(self.scoped(element.content).read_children(depth)?)
                } else {
                    TaggedContent::Raw(element.content)
                };
                Ok(Asn1Node::Tagged { number, content })
            }
            _ => {
                let element = self.take_element()?;
                Ok(Asn1Node::Other {
                    tag,
                    content: element.content,
                })
            }
        }
    }

    fn read_children(mut self, depth: usize) -> Result<Vec<Asn1Node<'a>>, MalformedEncoding> {
        let mut children = Vec::new();
        while self.has_data() {
            children.push(self.read_node_at_depth(depth + 1)?);
        }
        Ok(children)
    }

    fn scoped(&self, content: &'a [u8]) -> Asn1Reader<'a> {
        Asn1Reader::new(content, self.rules)
    }

    fn eof(&self, expected: &str) -> MalformedEncoding {
        MalformedEncoding::new(expected, "end of data")
    }

    fn read_expected(&mut self, expected: Tag) -> Result<Element<'a>, MalformedEncoding> {
        let actual = Tag::decode(self.data)
            .map(|(tag, _)| tag)
            .ok_or_else(|| self.eof(&expected.to_string()))?;
        if actual != expected {
            return Err(MalformedEncoding::new(expected, actual));
        }
        self.take_element()
    }

    fn take_element(&mut self) -> Result<Element<'a>, MalformedEncoding> {
        let element = split_element(self.data, self.rules, 0)?;
        self.data = &self.data[element.total_len..];
        Ok(element)
    }
}

fn split_element(
    data: &[u8],
    rules: EncodingRules,
    depth: usize,
) -> Result<Element<'_>, MalformedEncoding> {
    if depth > MAX_DEPTH {
        return Err(MalformedEncoding::new(
            format!("nesting depth <= {MAX_DEPTH}"),
            "deeper nesting",
        ));
    }
    let (tag, tag_len) =
        Tag::decode(data).ok_or_else(|| MalformedEncoding::new("an identifier octet", "end of data"))?;
    let rest = &data[tag_len..];
    let first = *rest
        .first()
        .ok_or_else(|| MalformedEncoding::new(format!("length octets for {tag}"), "end of data"))?;

    if first == 0x80 {
        if rules == EncodingRules::Der {
            return Err(MalformedEncoding::new(
                "definite length under DER",
                format!("indefinite length for {tag}"),
            ));
        }
        if !tag.constructed {
            return Err(MalformedEncoding::new(
                "definite length for primitive element",
                format!("indefinite length for {tag}"),
            ));
        }
        let start = tag_len + 1;
        let mut offset = start;
        loop {
            let remaining = &data[offset..];
            if remaining.len() >= 2 && remaining[0] == 0 && remaining[1] == 0 {
                return Ok(Element {
                    tag,
                    content: &data[start..offset],
                    total_len: offset + 2,
                });
            }
            if remaining.is_empty() {
                return Err(MalformedEncoding::new(
                    format!("end-of-contents for {tag}"),
                    "end of data",
                ));
            }
            let child = split_element(remaining, rules, depth + 1)?;
            if child.tag.is_end_of_contents() {
                return Err(MalformedEncoding::new(
                    "empty end-of-contents octets",
                    "non-empty end-of-contents element",
                ));
            }
            offset += child.total_len;
        }
    }

    let (length, length_len) = if first & 0x80 == 0 {
        (usize::from(first), 1)
    } else {
        let count = usize::from(first & 0x7f);
        if count > std::mem::size_of::<u32>() {
            return Err(MalformedEncoding::new(
                "length of at most 4 octets",
                format!("{count} length octets for {tag}"),
            ));
        }
        let octets = rest.get(1..=count).ok_or_else(|| {
            MalformedEncoding::new(format!("length octets for {tag}"), "end of data")
        })?;
        let length = octets
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
        if rules == EncodingRules::Der && (length < 0x80 || octets[0] == 0) {
            return Err(MalformedEncoding::new(
                "minimal length encoding under DER",
                format!("long-form length {length} for {tag}"),
            ));
        }
        (length, 1 + count)
    };

    let start = tag_len + length_len;
    let end = start.checked_add(length).filter(|end| *end <= data.len()).ok_or_else(|| {
        MalformedEncoding::new(
            format!("{length} content octets for {tag}"),
            format!("{} remaining", data.len().saturating_sub(start)),
        )
    })?;
    Ok(Element {
        tag,
        content: &data[start..end],
        total_len: end,
    })
}

fn decode_integer(content: &[u8]) -> Result<BigInt, MalformedEncoding> {
    if content.is_empty() {
        return Err(MalformedEncoding::new(
            "at least one INTEGER content octet",
            "empty INTEGER",
        ));
    }
    Ok(BigInt::from_signed_bytes_be(content))
}

fn decode_object_identifier(content: &[u8]) -> Result<String, MalformedEncoding> {
    if content.is_empty() {
        return Err(MalformedEncoding::new(
            "at least one OBJECT IDENTIFIER content octet",
            "empty OBJECT IDENTIFIER",
        ));
    }
    let mut arcs: Vec<u64> = Vec::new();
    let mut value: u64 = 0;
    let mut pending = false;
    for byte in content {
        if value > (u64::MAX >> 7) {
            return Err(MalformedEncoding::new(
                "OBJECT IDENTIFIER arc fitting in 64 bits",
                "oversized arc",
            ));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        pending = byte & 0x80 != 0;
        if !pending {
            if arcs.is_empty() {
                // The first subidentifier packs the first two arcs.
                let first = (value / 40).min(2);
                arcs.push(first);
                arcs.push(value - first * 40);
            } else {
                arcs.push(value);
            }
            value = 0;
        }
    }
    if pending {
        return Err(MalformedEncoding::new(
            "terminated OBJECT IDENTIFIER arc",
            "truncated arc",
        ));
    }
    Ok(arcs
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."))
}
