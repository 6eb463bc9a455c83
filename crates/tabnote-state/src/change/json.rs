//! Serde forms of changes.
//!
//! A [`ChangeDesc`] is a flat list of number pairs, `[len, ins]`, with
//! `ins == -1` for kept runs. A [`ChangeSet`] is a list with one entry per
//! section: a bare number for a kept run, `[len]` for a deletion and
//! `[len, ...lines]` for a replacement.

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use super::{ChangeDesc, ChangeSet, Section};
use crate::text::Text;

impl Serialize for ChangeDesc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.sections.len() * 2))?;
        for section in &self.sections {
            seq.serialize_element(&(section.len() as i64))?;
            seq.serialize_element(&section.ins().map_or(-1, |ins| ins as i64))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ChangeDesc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<ChangeDesc, D::Error> {
        let invalid = || de::Error::custom("Invalid JSON representation of ChangeDesc");
        let numbers = Vec::<i64>::deserialize(deserializer)?;
        if numbers.len() % 2 != 0 {
            return Err(invalid());
        }
        let mut sections = Vec::with_capacity(numbers.len() / 2);
        for pair in numbers.chunks_exact(2) {
            let len = usize::try_from(pair[0]).map_err(|_| invalid())?;
            let ins = match pair[1] {
                -1 => None,
                ins => Some(usize::try_from(ins).map_err(|_| invalid())?),
            };
            sections.push(Section::new(len, ins));
        }
        Ok(ChangeDesc::from_sections(sections))
    }
}

/// `[len, ...lines]` for one replaced section.
struct ReplacedPart<'a> {
    len: usize,
    text: Option<&'a Text>,
}

impl Serialize for ReplacedPart<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let lines = self.text.map_or(0, Text::lines);
        let mut seq = serializer.serialize_seq(Some(1 + lines))?;
        seq.serialize_element(&self.len)?;
        if let Some(text) = self.text {
            for line in text.iter_lines() {
                seq.serialize_element(line)?;
            }
        }
        seq.end()
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sections = self.sections();
        let mut seq = serializer.serialize_seq(Some(sections.len()))?;
        for (index, section) in sections.iter().enumerate() {
            match *section {
                Section::Retain(len) => seq.serialize_element(&len)?,
                Section::Replace { len, ins } => seq.serialize_element(&ReplacedPart {
                    len,
                    text: if ins > 0 { self.inserted_at(index) } else { None },
                })?,
            }
        }
        seq.end()
    }
}

/// One entry of a serialized change set.
enum Part {
    Retain(usize),
    Replace(usize, Vec<String>),
}

struct PartVisitor;

impl<'de> Visitor<'de> for PartVisitor {
    type Value = Part;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a length or an array of a length followed by lines")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Part, E> {
        usize::try_from(value)
            .map(Part::Retain)
            .map_err(|_| E::custom("Invalid JSON representation of ChangeSet"))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Part, E> {
        usize::try_from(value)
            .map(Part::Retain)
            .map_err(|_| E::custom("Invalid JSON representation of ChangeSet"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Part, A::Error> {
        let len: usize = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("Invalid JSON representation of ChangeSet"))?;
        let mut lines = Vec::new();
        while let Some(line) = seq.next_element::<String>()? {
            lines.push(line);
        }
        Ok(Part::Replace(len, lines))
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Part, D::Error> {
        deserializer.deserialize_any(PartVisitor)
    }
}

impl<'de> Deserialize<'de> for ChangeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<ChangeSet, D::Error> {
        let parts = Vec::<Part>::deserialize(deserializer)?;
        let mut sections = Vec::with_capacity(parts.len());
        let mut inserted = Vec::new();
        for (index, part) in parts.into_iter().enumerate() {
            match part {
                Part::Retain(len) => sections.push(Section::Retain(len)),
                Part::Replace(len, lines) if lines.is_empty() => {
                    sections.push(Section::Replace { len, ins: 0 });
                }
                Part::Replace(len, lines) => {
                    let text = Text::from_lines(lines);
                    sections.push(Section::Replace { len, ins: text.len() });
                    inserted.resize_with(index, Text::empty);
                    inserted.push(text);
                }
            }
        }
        Ok(ChangeSet::from_parts(sections, inserted))
    }
}
