use culvert_core::model::{DefectType, SectionFlag, SectionRecord};
use culvert_core::pricing::{CostResult, CostStatus, PricingReport};
use culvert_core::ProcessOutput;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions {
    /// Leave out sections without defects.
    pub defects_only: bool,
    pub verbose: bool,
    pub audit: bool,
}

pub fn print(result: &ProcessOutput, options: TableOptions) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(&mut out, result, options)
}

pub fn render(w: &mut impl Write, result: &ProcessOutput, options: TableOptions) -> io::Result<()> {
    let records: Vec<&SectionRecord> = result
        .records
        .iter()
        .filter(|r| !options.defects_only || r.defect_type != DefectType::ObservationOnly)
        .collect();

    print_summary(w, result)?;

    if records.is_empty() {
        let what = if options.defects_only {
            "sections with defects"
        } else {
            "sections"
        };
        writeln!(w, "  No {what}.\n")?;
    } else {
        print_records(w, &records, result.pricing.as_ref(), options.verbose)?;
    }

    if let Some(ref pricing) = result.pricing {
        print_pricing(w, pricing)?;
    }

    if options.verbose || options.audit {
        print_warnings(w, result)?;
    }

    if options.audit {
        print_audit(w, result, &records)?;
    }
    Ok(())
}

fn print_summary(w: &mut impl Write, result: &ProcessOutput) -> io::Result<()> {
    let sections = result
        .records
        .iter()
        .filter(|r| !r.is_split_part())
        .count();
    let count = |t: DefectType| result.records.iter().filter(|r| r.defect_type == t).count();
    let not_adoptable = result.records.iter().filter(|r| !r.adoptable).count();

    writeln!(w, "=== {} ===\n", result.audit.code_table)?;
    writeln!(
        w,
        "  Sections: {}  Records: {}  (structural {}, service {}, no defect {})",
        sections,
        result.records.len(),
        count(DefectType::Structural),
        count(DefectType::Service),
        count(DefectType::ObservationOnly)
    )?;
    if not_adoptable > 0 {
        writeln!(w, "  Not adoptable: {}", not_adoptable)?;
    }
    writeln!(w)
}

fn print_records(
    w: &mut impl Write,
    records: &[&SectionRecord],
    pricing: Option<&PricingReport>,
    verbose: bool,
) -> io::Result<()> {
    let item_w = records
        .iter()
        .map(|r| r.item.to_string().len())
        .max()
        .unwrap_or(4)
        .max(4);
    let nodes_w = records
        .iter()
        .map(|r| r.start_node.len() + r.finish_node.len() + 4)
        .max()
        .unwrap_or(10)
        .max(10);

    writeln!(
        w,
        "  {:<item_w$}  {:<nodes_w$}  {:<10}  {:<10}  {:>5}  {:<14}  {:>10}  Recommendation",
        "Item",
        "Nodes",
        "Direction",
        "Type",
        "Grade",
        "Codes",
        "Cost",
        item_w = item_w,
        nodes_w = nodes_w
    )?;

    for r in records {
        let nodes = format!("{} -> {}", r.start_node, r.finish_node);
        let kind = match r.defect_type {
            DefectType::Structural => "structural",
            DefectType::Service => "service",
            DefectType::ObservationOnly => "-",
        };
        let cost = pricing
            .and_then(|p| p.results.iter().find(|c| c.item == r.item))
            .map(cost_cell)
            .unwrap_or_default();
        writeln!(
            w,
            "  {:<item_w$}  {:<nodes_w$}  {:<10}  {:<10}  {:>5}  {:<14}  {:>10}  {}",
            r.item.to_string(),
            nodes,
            r.direction.to_string(),
            kind,
            r.grade.to_string(),
            r.defect_codes.join(","),
            cost,
            r.recommendation,
            item_w = item_w,
            nodes_w = nodes_w
        )?;

        if verbose {
            for flag in &r.flags {
                match flag {
                    SectionFlag::DirectionUnknown => {
                        writeln!(w, "      ! direction flag missing or unrecognized")?
                    }
                    SectionFlag::UnclassifiedObservation { code } => {
                        writeln!(w, "      ! observation code '{}' not in code table", code)?
                    }
                }
            }
            if !r.adoptable {
                writeln!(w, "      not adoptable")?;
            }
        }
    }
    writeln!(w)
}

fn cost_cell(result: &CostResult) -> String {
    match (result.status, result.cost) {
        (CostStatus::Priced, Some(cost)) => cost.to_string(),
        (CostStatus::Unmatched, _) => "unmatched".to_string(),
        (CostStatus::MissingValue, _) => "no value".to_string(),
        (CostStatus::Overflow, _) => "overflow".to_string(),
        (CostStatus::Priced, None) => String::new(),
    }
}

fn print_pricing(w: &mut impl Write, pricing: &PricingReport) -> io::Result<()> {
    write!(
        w,
        "  Pricing: {} (v{})",
        pricing.config_name, pricing.config_version
    )?;
    match pricing.total {
        Some(total) => writeln!(w, "  total {}", total)?,
        None => writeln!(w)?,
    }

    if !pricing.gaps.is_empty() {
        writeln!(w, "  Configuration gaps:")?;
        for gap in &pricing.gaps {
            let value = gap
                .comparison_value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "missing".to_string());
            writeln!(
                w,
                "    item {:<6} {} {} not priced",
                gap.item.to_string(),
                gap.comparison,
                value
            )?;
        }
    }
    writeln!(w)
}

fn print_warnings(w: &mut impl Write, result: &ProcessOutput) -> io::Result<()> {
    if result.audit.warnings.is_empty() {
        return Ok(());
    }
    writeln!(w, "  Warnings:")?;
    for warning in &result.audit.warnings {
        match warning.section_key {
            Some(ref key) => writeln!(w, "    [{}] {}", key, warning.message)?,
            None => writeln!(w, "    {}", warning.message)?,
        }
    }
    writeln!(w)
}

fn print_audit(
    w: &mut impl Write,
    result: &ProcessOutput,
    records: &[&SectionRecord],
) -> io::Result<()> {
    writeln!(w, "  Audit trail:")?;
    for entry in &result.audit.entries {
        if !records
            .iter()
            .any(|r| r.item.to_string() == entry.item && r.section_key == entry.section_key)
        {
            continue;
        }
        writeln!(w, "    {} (section {})", entry.item, entry.section_key)?;
        for step in &entry.steps {
            writeln!(w, "      - {}", step.message)?;
        }
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use culvert_core::reader::{Cell, MemorySource, RawTable};
    use culvert_core::{process_upload, ProcessOptions};

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    /// One defective section and one clean one.
    fn output() -> ProcessOutput {
        let mut sections = RawTable::new(
            "SECTION",
            &["OBJ_PK", "OBJ_FromNode", "OBJ_ToNode", "OBJ_SortOrder", "OBJ_Deleted"],
        );
        sections.push_row(vec![text("S1"), text("MH1"), text("MH2"), Cell::Int(1), Cell::Int(0)]);
        sections.push_row(vec![text("S2"), text("MH2"), text("MH3"), Cell::Int(2), Cell::Int(0)]);

        let mut inspections = RawTable::new(
            "SECINSP",
            &["INS_PK", "INS_Section_FK", "INS_InspectionDir"],
        );
        inspections.push_row(vec![text("I1"), text("S1"), text("D")]);
        inspections.push_row(vec![text("I2"), text("S2"), text("D")]);

        let mut observations = RawTable::new(
            "SECOBS",
            &["OBS_PK", "OBS_Inspection_FK", "OBS_OpCode", "OBS_Distance"],
        );
        observations.push_row(vec![text("O1"), text("I1"), text("FC"), Cell::Real(2.0)]);
        observations.push_row(vec![text("O2"), text("I2"), text("ST"), Cell::Real(0.0)]);

        let statistics = RawTable::new(
            "SECSTAT",
            &["STA_Section_FK", "STA_ServiceGrade", "STA_StructuralGrade"],
        );

        let source = MemorySource::new("memory")
            .with_table(sections)
            .with_table(inspections)
            .with_table(observations)
            .with_table(statistics);
        process_upload(&source, None, &ProcessOptions::default()).unwrap()
    }

    fn rendered(result: &ProcessOutput, options: TableOptions) -> String {
        let mut buf = Vec::new();
        render(&mut buf, result, options).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_grade_zero_sections_rendered_by_default() {
        let result = output();
        let table = rendered(&result, TableOptions::default());

        assert!(table.contains("MH1 -> MH2"));
        assert!(table.contains("MH2 -> MH3"));
        assert!(table.contains("No action required"));
    }

    #[test]
    fn test_defects_only_hides_clean_sections() {
        let result = output();
        let table = rendered(
            &result,
            TableOptions {
                defects_only: true,
                ..TableOptions::default()
            },
        );

        assert!(table.contains("MH1 -> MH2"));
        assert!(!table.contains("MH2 -> MH3"));
        assert!(!table.contains("No action required"));
    }
}
