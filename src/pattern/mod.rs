//! The evaluator's output: a typed record of every decoded field (§4.5).

mod color;

pub use color::{default_color_for, parse_rgb_hex};

use serde::Serialize;

use crate::value::Literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn swap(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }
}

/// A sort key accepted by [`Pattern::sort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Offset,
    Size,
    Value,
    Type,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PatternKind {
    Padding,
    Unsigned(u128),
    Signed(i128),
    Float(f64),
    Boolean(bool),
    Character(char),
    Character16(u16),
    String(String),
    String16(String),
    Pointer {
        pointee: Box<Pattern>,
        pointed_at_address: u64,
        pointer_base: u64,
    },
    StaticArray {
        template: Box<Pattern>,
        entry_count: u64,
    },
    DynamicArray {
        entries: Vec<Pattern>,
    },
    Struct {
        members: Vec<Pattern>,
        /// A permutation of indices into `members` giving the current
        /// display order (§4.5 "sort... preserves member storage order
        /// under the hood"). Identity (`0..members.len()`) until
        /// [`Pattern::sort`] reorders it; `members` itself never moves.
        sorted_members: Vec<usize>,
    },
    Union {
        members: Vec<Pattern>,
    },
    Enum {
        underlying_size: u64,
        entries: Vec<(Literal, String)>,
        value: i128,
    },
    Bitfield {
        fields: Vec<Pattern>,
    },
    BitfieldField {
        bit_offset: u64,
        bit_size: u64,
        value: u128,
        owning_bitfield: String,
    },
}

impl PatternKind {
    /// Builds a `Struct` variant with an identity display order, the shape
    /// every struct starts in before [`Pattern::sort`] is ever called.
    pub fn struct_of(members: Vec<Pattern>) -> Self {
        let sorted_members = (0..members.len()).collect();
        PatternKind::Struct {
            members,
            sorted_members,
        }
    }
}

/// One decoded field: a byte range annotated with a name, type, color and
/// value. Children are owned exclusively; [`Pattern::clone`] is always deep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub offset: u64,
    pub size: u64,
    pub color: u32,
    pub variable_name: String,
    pub display_name: Option<String>,
    pub type_name: String,
    pub endian: Endian,
    pub hidden: bool,
    pub local: bool,
    pub manual_color: bool,
    pub truncated: bool,
    pub comment: Option<String>,
    pub transform_fn: Option<String>,
    pub formatter_fn: Option<String>,
}

impl Pattern {
    pub fn new(kind: PatternKind, type_name: impl Into<String>, endian: Endian) -> Self {
        let type_name = type_name.into();
        let color = default_color_for(&type_name);
        Self {
            kind,
            offset: 0,
            size: 0,
            color,
            variable_name: String::new(),
            display_name: None,
            type_name,
            endian,
            hidden: false,
            local: false,
            manual_color: false,
            truncated: false,
            comment: None,
            transform_fn: None,
            formatter_fn: None,
        }
    }

    pub fn with_span(mut self, offset: u64, size: u64) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.variable_name = name.into();
        self
    }

    /// The name shown in the UI: `display_name` if set via `[[name(...)]]`,
    /// else the variable's own name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.variable_name)
    }

    /// Produce a display string for the value, honoring a user-supplied
    /// `formatter_fn` if one is recorded (the evaluator is responsible for
    /// actually invoking it and overwriting `display_name`/`comment`; this
    /// method provides the built-in default used when none is attached).
    pub fn format(&self) -> String {
        match &self.kind {
            PatternKind::Padding => format!("padding[{}]", self.size),
            PatternKind::Unsigned(v) => format!("0x{v:X}"),
            PatternKind::Signed(v) => format!("{v}"),
            PatternKind::Float(v) => format!("{v}"),
            PatternKind::Boolean(v) => v.to_string(),
            PatternKind::Character(c) => format!("'{c}'"),
            PatternKind::Character16(c) => format!("'{c}'"),
            PatternKind::String(s) => format!("\"{s}\""),
            PatternKind::String16(s) => format!("\"{s}\""),
            PatternKind::Pointer {
                pointed_at_address, ..
            } => format!("*(0x{pointed_at_address:X})"),
            PatternKind::StaticArray {
                template,
                entry_count,
            } => format!("{}[{entry_count}]", template.type_name),
            PatternKind::DynamicArray { entries } => {
                format!("[{}]", entries.len())
            }
            PatternKind::Struct {
                members,
                sorted_members,
            } => {
                let inner = sorted_members
                    .iter()
                    .map(|&i| &members[i])
                    .filter(|m| !m.hidden)
                    .map(|m| format!("{}={}", m.display_name(), m.format()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {inner} }}")
            }
            PatternKind::Union { members } => {
                let inner = members
                    .iter()
                    .filter(|m| !m.hidden)
                    .map(|m| format!("{}={}", m.display_name(), m.format()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {inner} }}")
            }
            PatternKind::Enum { entries, value, .. } => entries
                .iter()
                .find(|(v, _)| v.as_i128() == Some(*value))
                .map(|(_, name)| format!("{name}(0x{value:X})"))
                .unwrap_or_else(|| format!("???(0x{value:X})")),
            PatternKind::Bitfield { fields } => {
                let inner = fields
                    .iter()
                    .map(|f| format!("{}={}", f.display_name(), f.format()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {inner} }}")
            }
            PatternKind::BitfieldField { value, .. } => format!("0x{value:X}"),
        }
    }

    /// Find the deepest non-hidden pattern covering `offset`.
    pub fn get_pattern(&self, offset: u64) -> Option<&Pattern> {
        if self.local || offset < self.offset || offset >= self.offset + self.size {
            return None;
        }

        let descend = match &self.kind {
            PatternKind::Struct { members, .. } | PatternKind::Union { members } => {
                members.iter().find_map(|m| m.get_pattern(offset))
            }
            PatternKind::DynamicArray { entries } => {
                entries.iter().find_map(|e| e.get_pattern(offset))
            }
            PatternKind::StaticArray {
                template,
                entry_count,
            } => {
                // O(1) bounds check via index arithmetic, per §4.5; the
                // logical entry is never materialized, so the result is the
                // array pattern itself rather than a synthesized per-entry
                // reference (a fresh offset-shifted entry cannot be handed
                // back as `&Pattern` without materializing it).
                if template.size == 0 {
                    None
                } else {
                    let index = (offset - self.offset) / template.size;
                    if index >= *entry_count {
                        None
                    } else {
                        Some(self)
                    }
                }
            }
            PatternKind::Pointer { pointee, .. } => pointee.get_pattern(offset),
            PatternKind::Bitfield { fields } => fields.iter().find_map(|f| f.get_pattern(offset)),
            _ => None,
        };

        if let Some(found) = descend {
            if !found.hidden {
                return Some(found);
            }
        }

        if self.hidden {
            None
        } else {
            Some(self)
        }
    }

    /// Rebase every pointer pattern in this subtree onto `new_base` without
    /// re-reading the provider (§4.5 "pointer-base").
    pub fn rebase_pointers(&mut self, new_base: u64) {
        if let PatternKind::Pointer {
            pointee,
            pointed_at_address,
            pointer_base,
        } = &mut self.kind
        {
            let delta = new_base as i128 - *pointer_base as i128;
            *pointed_at_address = (*pointed_at_address as i128 + delta) as u64;
            *pointer_base = new_base;
            pointee.rebase_pointers(new_base);
            return;
        }

        match &mut self.kind {
            PatternKind::Struct { members, .. } | PatternKind::Union { members } => {
                for m in members {
                    m.rebase_pointers(new_base);
                }
            }
            PatternKind::DynamicArray { entries } => {
                for e in entries {
                    e.rebase_pointers(new_base);
                }
            }
            PatternKind::StaticArray { template, .. } => template.rebase_pointers(new_base),
            PatternKind::Bitfield { fields } => {
                for f in fields {
                    f.rebase_pointers(new_base);
                }
            }
            _ => {}
        }
    }

    /// Contribute `(address, color)` pairs for every visible byte this
    /// pattern covers, recursing into containers. Lazy: does not
    /// materialize entries of a static array.
    pub fn highlighted_addresses(&self) -> Box<dyn Iterator<Item = (u64, u32)> + '_> {
        if self.hidden || self.local {
            return Box::new(std::iter::empty());
        }

        match &self.kind {
            PatternKind::Struct { members, .. } | PatternKind::Union { members } => {
                Box::new(members.iter().flat_map(|m| m.highlighted_addresses()))
            }
            PatternKind::DynamicArray { entries } => {
                Box::new(entries.iter().flat_map(|e| e.highlighted_addresses()))
            }
            PatternKind::Bitfield { fields } => {
                Box::new(fields.iter().flat_map(|f| f.highlighted_addresses()))
            }
            PatternKind::Pointer { pointee, .. } => Box::new(
                (self.offset..self.offset + self.size)
                    .map(|a| (a, self.color))
                    .chain(pointee.highlighted_addresses()),
            ),
            PatternKind::StaticArray { .. } => {
                Box::new((self.offset..self.offset + self.size).map(|a| (a, self.color)))
            }
            _ => Box::new((self.offset..self.offset + self.size).map(|a| (a, self.color))),
        }
    }

    fn cmp_by(a: &Pattern, b: &Pattern, key: SortKey, direction: SortDirection) -> std::cmp::Ordering {
        let ord = match key {
            SortKey::Name => a.display_name().cmp(b.display_name()),
            SortKey::Offset => a.offset.cmp(&b.offset),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Type => a.type_name.cmp(&b.type_name),
            SortKey::Color => a.color.cmp(&b.color),
            SortKey::Value => a.format().cmp(&b.format()),
        };
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }

    /// In-place stable sort of a container's *visible* child list.
    ///
    /// For a struct this only reorders the `sorted_members` index
    /// permutation (§4.5: "preserves member storage order under the
    /// hood") — `members` itself, and therefore every offset computed
    /// from declaration order, never moves. Unions and dynamic arrays
    /// have no separate storage-order concept to preserve (a union's
    /// members all share one start offset; a dynamic array's entries
    /// carry no declared order of their own), so those sort in place.
    pub fn sort(&mut self, key: SortKey, direction: SortDirection) {
        match &mut self.kind {
            PatternKind::Struct {
                members,
                sorted_members,
            } => {
                sorted_members.sort_by(|&i, &j| Self::cmp_by(&members[i], &members[j], key, direction));
            }
            PatternKind::Union { members } => {
                members.sort_by(|a, b| Self::cmp_by(a, b, key, direction));
            }
            PatternKind::DynamicArray { entries } => {
                entries.sort_by(|a, b| Self::cmp_by(a, b, key, direction));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(offset: u64, size: u64) -> Pattern {
        Pattern::new(PatternKind::Unsigned(0), "u8", Endian::Little).with_span(offset, size)
    }

    #[test]
    fn clone_is_deep_and_equal() {
        let mut members = vec![leaf(0, 1), leaf(1, 1)];
        members[0].variable_name = "a".into();
        let original = Pattern::new(PatternKind::struct_of(members), "P", Endian::Little)
            .with_span(0, 2)
            .with_name("p");

        let mut clone = original.clone();
        assert_eq!(clone, original);

        if let PatternKind::Struct { members, .. } = &mut clone.kind {
            members[0].variable_name = "mutated".into();
        }
        assert_ne!(clone, original);
    }

    #[test]
    fn get_pattern_finds_deepest_visible() {
        let mut a = leaf(0, 1).with_name("a");
        a.hidden = false;
        let b = leaf(1, 1).with_name("b");
        let root = Pattern::new(
            PatternKind::struct_of(vec![a, b]),
            "P",
            Endian::Little,
        )
        .with_span(0, 2)
        .with_name("p");

        assert_eq!(root.get_pattern(0).unwrap().variable_name, "a");
        assert_eq!(root.get_pattern(1).unwrap().variable_name, "b");
        assert!(root.get_pattern(2).is_none());
    }

    #[test]
    fn hidden_members_do_not_contribute_highlights() {
        let mut hidden = leaf(0, 1).with_name("a");
        hidden.hidden = true;
        let visible = leaf(1, 1).with_name("b");
        let root = Pattern::new(
            PatternKind::struct_of(vec![hidden, visible]),
            "P",
            Endian::Little,
        )
        .with_span(0, 2);

        let highlights: Vec<_> = root.highlighted_addresses().collect();
        assert_eq!(highlights, vec![(1, default_color_for("u8"))]);
    }

    #[test]
    fn sort_reorders_display_without_moving_storage() {
        let members = vec![leaf(0, 1).with_name("a"), leaf(1, 1).with_name("b")];
        let mut root = Pattern::new(PatternKind::struct_of(members), "P", Endian::Little);
        root.sort(SortKey::Offset, SortDirection::Descending);

        let PatternKind::Struct {
            members,
            sorted_members,
        } = &root.kind
        else {
            unreachable!();
        };
        // storage order is untouched: `a` is still members[0].
        assert_eq!(members[0].variable_name, "a");
        assert_eq!(members[1].variable_name, "b");
        // the display permutation reflects the requested sort.
        assert_eq!(members[sorted_members[0]].variable_name, "b");
        assert_eq!(members[sorted_members[1]].variable_name, "a");
    }
}
