use std::borrow::Cow;

use num_bigint::BigInt;

use super::tag::Tag;

/// A decoded element, borrowing from the buffer it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asn1Node<'a> {
    Sequence(Vec<Asn1Node<'a>>),
    Set(Vec<Asn1Node<'a>>),
    Integer(BigInt),
    OctetString(Cow<'a, [u8]>),
    ObjectIdentifier(String),
    Tagged {
        number: u32,
        content: TaggedContent<'a>,
    },
    CharacterString(String),
    /// Any universal type outside the supported vocabulary (NULL, BOOLEAN,
    /// BIT STRING, times, ...), kept as raw content.
    Other { tag: Tag, content: &'a [u8] },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedContent<'a> {
    /// Constructed context-specific element: its children.
    Nested(Vec<Asn1Node<'a>>),
    /// Primitive (implicitly tagged) element: its raw content.
    Raw(&'a [u8]),
}

impl<'a> Asn1Node<'a> {
    pub fn children(&self) -> &[Asn1Node<'a>] {
        match self {
            Asn1Node::Sequence(children) | Asn1Node::Set(children) => children,
            Asn1Node::Tagged {
                content: TaggedContent::Nested(children),
                ..
            } => children,
            _ => &[],
        }
    }
}
