//! Deterministic species → color assignment.
//!
//! Species are ranked lexically and take `TAB20[rank % 20]`, so the binding
//! only changes when the set of species changes.

use std::collections::BTreeMap;

use crate::domain::Rgba;

/// Color for anything not in the map, including rows without a species.
pub const FALLBACK: Rgba = Rgba([180, 180, 180, 255]);

pub const TAB20: [Rgba; 20] = [
    Rgba::from_hex(0x1f77b4),
    Rgba::from_hex(0xaec7e8),
    Rgba::from_hex(0xff7f0e),
    Rgba::from_hex(0xffbb78),
    Rgba::from_hex(0x2ca02c),
    Rgba::from_hex(0x98df8a),
    Rgba::from_hex(0xd62728),
    Rgba::from_hex(0xff9896),
    Rgba::from_hex(0x9467bd),
    Rgba::from_hex(0xc5b0d5),
    Rgba::from_hex(0x8c564b),
    Rgba::from_hex(0xc49c94),
    Rgba::from_hex(0xe377c2),
    Rgba::from_hex(0xf7b6d2),
    Rgba::from_hex(0x7f7f7f),
    Rgba::from_hex(0xc7c7c7),
    Rgba::from_hex(0xbcbd22),
    Rgba::from_hex(0xdbdb8d),
    Rgba::from_hex(0x17becf),
    Rgba::from_hex(0x9edae5),
];

/// Histogram group colors, indexed by top-N rank.
pub const TAB10: [Rgba; 10] = [
    Rgba::from_hex(0x1f77b4),
    Rgba::from_hex(0xff7f0e),
    Rgba::from_hex(0x2ca02c),
    Rgba::from_hex(0xd62728),
    Rgba::from_hex(0x9467bd),
    Rgba::from_hex(0x8c564b),
    Rgba::from_hex(0xe377c2),
    Rgba::from_hex(0x7f7f7f),
    Rgba::from_hex(0xbcbd22),
    Rgba::from_hex(0x17becf),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorMap {
    colors: BTreeMap<String, Rgba>,
}

impl ColorMap {
    /// Builds the mapping for `categories`. Input order and duplicates do not
    /// matter.
    pub fn assign<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sorted = categories
            .into_iter()
            .map(|category| category.as_ref().to_string())
            .collect::<Vec<_>>();
        sorted.sort();
        sorted.dedup();

        let colors = sorted
            .into_iter()
            .enumerate()
            .map(|(rank, category)| (category, TAB20[rank % TAB20.len()]))
            .collect();
        Self { colors }
    }

    pub fn get(&self, category: Option<&str>) -> Rgba {
        category
            .and_then(|category| self.colors.get(category))
            .copied()
            .unwrap_or(FALLBACK)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Rgba)> {
        self.colors
            .iter()
            .map(|(category, color)| (category.as_str(), *color))
    }
}

pub fn group_color(rank: usize) -> Rgba {
    TAB10[rank % TAB10.len()]
}
