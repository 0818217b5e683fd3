use crate::model::{FlowDirection, RawInspectionRow, RawSectionRow};
use serde::{Deserialize, Serialize};

/// Resolved node labels of a section. With a known direction `start` is
/// the upstream end of the pipe; an unknown direction keeps the export's
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub start: String,
    pub finish: String,
    pub direction: FlowDirection,
}

impl Topology {
    pub fn direction_unknown(&self) -> bool {
        self.direction == FlowDirection::Unknown
    }
}

/// Resolve start/finish labels and flow direction for one section.
///
/// Upstream surveys swap the raw labels. Downstream and unknown keep the
/// export's order. Missing labels become empty strings. Every section is
/// handled on its own; sections sharing a node pair are not reconciled.
pub fn normalize(section: &RawSectionRow, inspection: Option<&RawInspectionRow>) -> Topology {
    let direction = FlowDirection::from_flag(inspection.and_then(|i| i.direction.as_deref()));
    let from = section.from_node.clone().unwrap_or_default();
    let to = section.to_node.clone().unwrap_or_default();

    let (start, finish) = match direction {
        FlowDirection::Upstream => (to, from),
        FlowDirection::Downstream | FlowDirection::Unknown => (from, to),
    };

    Topology {
        start,
        finish,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(from: Option<&str>, to: Option<&str>) -> RawSectionRow {
        RawSectionRow {
            key: "S1".into(),
            from_node: from.map(String::from),
            to_node: to.map(String::from),
            sort_key: None,
            deleted: false,
            diameter_mm: None,
            material: None,
            total_length: None,
        }
    }

    fn inspection(dir: &str) -> RawInspectionRow {
        RawInspectionRow {
            key: "I1".into(),
            section_key: "S1".into(),
            direction: Some(dir.into()),
            surveyed_length: None,
        }
    }

    #[test]
    fn test_upstream_swaps_labels() {
        let topo = normalize(&section(Some("SW02"), Some("SW01")), Some(&inspection("U")));
        assert_eq!(topo.start, "SW01");
        assert_eq!(topo.finish, "SW02");
        assert_eq!(topo.direction, FlowDirection::Upstream);
    }

    #[test]
    fn test_downstream_keeps_labels() {
        let topo = normalize(
            &section(Some("SW02"), Some("SW01")),
            Some(&inspection("downstream")),
        );
        assert_eq!(topo.start, "SW02");
        assert_eq!(topo.finish, "SW01");
        assert!(!topo.direction_unknown());
    }

    #[test]
    fn test_unknown_direction_keeps_raw_order() {
        let topo = normalize(&section(Some("A"), Some("B")), Some(&inspection("sideways")));
        assert_eq!((topo.start.as_str(), topo.finish.as_str()), ("A", "B"));
        assert!(topo.direction_unknown());

        let no_inspection = normalize(&section(Some("A"), Some("B")), None);
        assert!(no_inspection.direction_unknown());
    }

    #[test]
    fn test_missing_labels_become_empty() {
        let topo = normalize(&section(None, Some("MH9")), Some(&inspection("up")));
        assert_eq!(topo.start, "MH9");
        assert_eq!(topo.finish, "");
    }
}
