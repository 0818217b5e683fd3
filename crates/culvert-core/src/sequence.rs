use crate::model::RawSectionRow;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How item numbers were derived for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingMode {
    /// Sort keys form a consecutive run and were renumbered from 1.
    Consecutive,
    /// Sort keys have gaps and are used as the item numbers.
    Preserved,
    /// Sort keys were unusable (duplicates or below 1); numbered by position.
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedSection<'a> {
    pub section: &'a RawSectionRow,
    pub item: u32,
}

#[derive(Debug, Clone)]
pub struct Sequence<'a> {
    /// Live sections in item order.
    pub sections: Vec<SequencedSection<'a>>,
    pub mode: NumberingMode,
    pub warnings: Vec<String>,
}

/// Assign base item numbers to the live sections of an upload.
///
/// Soft-deleted rows are dropped first. Keyed rows are ordered by
/// (sort key, section key); rows without a sort key follow in section-key
/// order, numbered from the last assigned number.
pub fn assign_items(sections: &[RawSectionRow]) -> Sequence<'_> {
    let live: Vec<&RawSectionRow> = sections.iter().filter(|s| !s.deleted).collect();

    let mut keyed: Vec<(&RawSectionRow, i64)> = live
        .iter()
        .filter_map(|s| s.sort_key.map(|k| (*s, k)))
        .collect();
    keyed.sort_by(|(a, ka), (b, kb)| ka.cmp(kb).then_with(|| a.key.cmp(&b.key)));

    let mut unkeyed: Vec<&RawSectionRow> =
        live.iter().copied().filter(|s| s.sort_key.is_none()).collect();
    unkeyed.sort_by(|a, b| a.key.cmp(&b.key));

    let mut warnings = Vec::new();
    let keys: Vec<i64> = keyed.iter().map(|(_, k)| *k).collect();
    let mode = numbering_mode(&keys, &mut warnings);

    let mut out = Vec::with_capacity(live.len());
    let mut last = 0u32;
    for (idx, &(section, key)) in keyed.iter().enumerate() {
        let item = match mode {
            NumberingMode::Preserved => u32::try_from(key).unwrap_or(u32::MAX),
            NumberingMode::Consecutive | NumberingMode::Positional => {
                u32::try_from(idx + 1).unwrap_or(u32::MAX)
            }
        };
        last = item;
        out.push(SequencedSection { section, item });
    }

    if !unkeyed.is_empty() {
        tracing::debug!(
            count = unkeyed.len(),
            "sections without sort key appended after keyed sections"
        );
    }
    for section in unkeyed {
        last = last.saturating_add(1);
        out.push(SequencedSection {
            section,
            item: last,
        });
    }

    Sequence {
        sections: out,
        mode,
        warnings,
    }
}

fn numbering_mode(keys: &[i64], warnings: &mut Vec<String>) -> NumberingMode {
    let consecutive = keys.windows(2).all(|w| w[0].checked_add(1) == Some(w[1]));
    if consecutive {
        return NumberingMode::Consecutive;
    }

    if let Some(bad) = keys.iter().find(|k| **k < 1 || **k > i64::from(u32::MAX)) {
        let msg = format!("sort key {bad} cannot be an item number; numbering by position");
        tracing::warn!("{msg}");
        warnings.push(msg);
        return NumberingMode::Positional;
    }

    let mut seen = HashSet::with_capacity(keys.len());
    if let Some(dup) = keys.iter().find(|k| !seen.insert(**k)) {
        let msg = format!("duplicate sort key {dup}; numbering by position");
        tracing::warn!("{msg}");
        warnings.push(msg);
        return NumberingMode::Positional;
    }

    NumberingMode::Preserved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, sort_key: Option<i64>, deleted: bool) -> RawSectionRow {
        RawSectionRow {
            key: key.into(),
            from_node: None,
            to_node: None,
            sort_key,
            deleted,
            diameter_mm: None,
            material: None,
            total_length: None,
        }
    }

    fn items(seq: &Sequence<'_>) -> Vec<(String, u32)> {
        seq.sections
            .iter()
            .map(|s| (s.section.key.clone(), s.item))
            .collect()
    }

    #[test]
    fn test_consecutive_keys_renumbered_from_one() {
        let rows = vec![row("c", Some(12), false), row("a", Some(10), false), row("b", Some(11), false)];
        let seq = assign_items(&rows);
        assert_eq!(seq.mode, NumberingMode::Consecutive);
        assert_eq!(
            items(&seq),
            vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]
        );
    }

    #[test]
    fn test_gapped_keys_preserved() {
        let rows: Vec<RawSectionRow> = [2, 4, 6, 8, 9, 10]
            .iter()
            .map(|k| row(&format!("S{k}"), Some(*k), false))
            .collect();
        let seq = assign_items(&rows);
        assert_eq!(seq.mode, NumberingMode::Preserved);
        let numbers: Vec<u32> = seq.sections.iter().map(|s| s.item).collect();
        assert_eq!(numbers, vec![2, 4, 6, 8, 9, 10]);
    }

    #[test]
    fn test_deleted_rows_dropped_before_numbering() {
        let rows = vec![
            row("a", Some(1), false),
            row("b", Some(2), true),
            row("c", Some(3), false),
        ];
        let seq = assign_items(&rows);
        // 1, 3 is a gap once the deleted row is gone
        assert_eq!(items(&seq), vec![("a".into(), 1), ("c".into(), 3)]);
    }

    #[test]
    fn test_duplicate_keys_fall_back_to_position() {
        let rows = vec![row("b", Some(5), false), row("a", Some(5), false), row("c", Some(9), false)];
        let seq = assign_items(&rows);
        assert_eq!(seq.mode, NumberingMode::Positional);
        assert_eq!(
            items(&seq),
            vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]
        );
        assert_eq!(seq.warnings.len(), 1);
    }

    #[test]
    fn test_non_positive_keys_fall_back_to_position() {
        let rows = vec![row("a", Some(0), false), row("b", Some(7), false)];
        let seq = assign_items(&rows);
        assert_eq!(seq.mode, NumberingMode::Positional);
        assert_eq!(items(&seq), vec![("a".into(), 1), ("b".into(), 2)]);
    }

    #[test]
    fn test_unkeyed_rows_appended() {
        let rows = vec![
            row("z", None, false),
            row("a", Some(4), false),
            row("b", Some(8), false),
            row("m", None, false),
        ];
        let seq = assign_items(&rows);
        assert_eq!(
            items(&seq),
            vec![("a".into(), 4), ("b".into(), 8), ("m".into(), 9), ("z".into(), 10)]
        );
    }

    #[test]
    fn test_single_and_empty() {
        assert!(assign_items(&[]).sections.is_empty());
        let rows = vec![row("a", Some(40), false)];
        assert_eq!(items(&assign_items(&rows)), vec![("a".into(), 1)]);
    }
}
