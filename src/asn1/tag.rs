use std::fmt;

/// Universal tag numbers for the types the reader understands.
pub mod universal {
    pub const END_OF_CONTENTS: u32 = 0;
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const IA5_STRING: u32 = 22;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }
}

/// Identifier octets of a BER element: class, primitive/constructed flag and
/// tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub const INTEGER: Tag = Tag::universal(universal::INTEGER, false);
    pub const OCTET_STRING: Tag = Tag::universal(universal::OCTET_STRING, false);
    pub const OBJECT_IDENTIFIER: Tag = Tag::universal(universal::OBJECT_IDENTIFIER, false);
    pub const SEQUENCE: Tag = Tag::universal(universal::SEQUENCE, true);
    pub const SET: Tag = Tag::universal(universal::SET, true);

    pub const fn universal(number: u32, constructed: bool) -> Self {
        Tag {
            class: TagClass::Universal,
            constructed,
            number,
        }
    }

    pub const fn context_specific(number: u32, constructed: bool) -> Self {
        Tag {
            class: TagClass::ContextSpecific,
            constructed,
            number,
        }
    }

    /// Same class and number, ignoring the primitive/constructed bit.
    pub fn has_same_class_and_number(&self, other: &Tag) -> bool {
        self.class == other.class && self.number == other.number
    }

    pub(crate) fn is_end_of_contents(&self) -> bool {
        self.class == TagClass::Universal
            && !self.constructed
            && self.number == universal::END_OF_CONTENTS
    }

    /// Decodes identifier octets at the start of `data`. Returns the tag and
    /// the number of bytes consumed, or `None` if the identifier is truncated
    /// or its tag number does not fit in 32 bits.
    pub(crate) fn decode(data: &[u8]) -> Option<(Tag, usize)> {
        let first = *data.first()?;
        let class = TagClass::from_bits(first >> 6);
        let constructed = first & 0x20 != 0;
        let low = u32::from(first & 0x1f);
        if low != 0x1f {
            return Some((
                Tag {
                    class,
                    constructed,
                    number: low,
                },
                1,
            ));
        }
        // High tag number form: base-128, most significant group first.
        let mut number: u32 = 0;
        for (i, byte) in data.iter().enumerate().skip(1) {
            if number > (u32::MAX >> 7) {
                return None;
            }
            number = (number << 7) | u32::from(byte & 0x7f);
            if byte & 0x80 == 0 {
                return Some((
                    Tag {
                        class,
                        constructed,
                        number,
                    },
                    i + 1,
                ));
            }
        }
        None
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = if self.constructed {
            "constructed"
        } else {
            "primitive"
        };
        match self.class {
            TagClass::Universal => {
                let name = match self.number {
                    universal::END_OF_CONTENTS => "END-OF-CONTENTS",
                    universal::BOOLEAN => "BOOLEAN",
                    universal::INTEGER => "INTEGER",
                    universal::BIT_STRING => "BIT STRING",
                    universal::OCTET_STRING => "OCTET STRING",
                    universal::NULL => "NULL",
                    universal::OBJECT_IDENTIFIER => "OBJECT IDENTIFIER",
                    universal::UTF8_STRING => "UTF8String",
                    universal::SEQUENCE => "SEQUENCE",
                    universal::SET => "SET",
                    universal::PRINTABLE_STRING => "PrintableString",
                    universal::IA5_STRING => "IA5String",
                    n => return write!(f, "[UNIVERSAL {n}] {form}"),
                };
                write!(f, "{name} ({form})")
            }
            TagClass::Application => write!(f, "[APPLICATION {}] {form}", self.number),
            TagClass::ContextSpecific => write!(f, "[CONTEXT {}] {form}", self.number),
            TagClass::Private => write!(f, "[PRIVATE {}] {form}", self.number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_low_tag_numbers() {
        assert_eq!(Tag::decode(&[0x30]), Some((Tag::SEQUENCE, 1)));
        assert_eq!(Tag::decode(&[0x31]), Some((Tag::SET, 1)));
        assert_eq!(
            Tag::decode(&[0xa0]),
            Some((Tag::context_specific(0, true), 1))
        );
        assert_eq!(
            Tag::decode(&[0x80]),
            Some((Tag::context_specific(0, false), 1))
        );
    }

    #[test]
    fn decodes_high_tag_numbers() {
        // [CONTEXT 1703] constructed: 0xbf, then 1703 = 0b1101_0100111 in base-128.
        let (tag, consumed) = Tag::decode(&[0xbf, 0x8d, 0x27]).unwrap();
        assert_eq!(tag, Tag::context_specific(1703, true));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn rejects_truncated_high_tag_numbers() {
        assert_eq!(Tag::decode(&[0x1f, 0x81]), None);
        assert_eq!(Tag::decode(&[]), None);
    }

    #[test]
    fn display_names_universal_and_context_tags() {
        assert_eq!(Tag::SEQUENCE.to_string(), "SEQUENCE (constructed)");
        assert_eq!(
            Tag::context_specific(3, true).to_string(),
            "[CONTEXT 3] constructed"
        );
    }
}
