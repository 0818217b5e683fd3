use culvert_core::error::SurveyError;
use culvert_core::rules::schema::CodeCategory;
use culvert_core::rules::{self, builtin, CodeTable};
use std::path::Path;

pub fn list() -> Result<(), SurveyError> {
    println!("Available predefined code tables:\n");
    for name in builtin::PRESETS {
        let table = builtin::load_preset(name)?;
        println!("  {:<8} {} (v{})", name, table.name(), table.version());
        if let Some(ref desc) = table.definition().description {
            println!("           {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn explain(code: Option<&str>, codes: Option<&Path>) -> Result<(), SurveyError> {
    let custom;
    let table = match codes {
        Some(path) => {
            custom = rules::load_code_table(path)?;
            &custom
        }
        None => builtin::default_table(),
    };

    match code {
        Some(code) => explain_code(table, code),
        None => {
            explain_table(table);
            Ok(())
        }
    }
}

fn explain_table(table: &CodeTable) {
    let def = table.definition();
    println!("{} (version {})\n", def.name, def.version);
    if let Some(ref desc) = def.description {
        println!("{}\n", desc);
    }

    println!("Percentage bands (area loss):");
    let mut lower = None;
    for band in &def.percent_bands {
        match lower {
            None => println!("  up to {:>6}%  -> grade {}", band.max, band.grade),
            Some(lo) => println!("  {:>5}% - {:>5}%  -> grade {}", lo, band.max, band.grade),
        }
        lower = Some(band.max);
    }
    println!("  above          -> grade {}\n", def.percent_fallback_grade);

    println!(
        "Structural failure markers: {}",
        join_or_none(&def.structural_failure_codes)
    );
    println!("Lining/patching markers:    {}\n", join_or_none(&def.lining_codes));

    for category in [
        CodeCategory::Structural,
        CodeCategory::Service,
        CodeCategory::Informational,
    ] {
        let mut codes: Vec<_> = def
            .codes
            .iter()
            .filter(|c| c.category == category)
            .collect();
        if codes.is_empty() {
            continue;
        }
        codes.sort_by(|a, b| a.code.cmp(&b.code));

        println!("{}:", category_label(category));
        for c in codes {
            let pct = if c.percent_graded { " (%)" } else { "" };
            println!(
                "  {:<6} grade {}{:<4}  {}",
                c.code,
                c.grade,
                pct,
                c.description.as_deref().unwrap_or("")
            );
        }
        println!();
    }
}

fn explain_code(table: &CodeTable, code: &str) -> Result<(), SurveyError> {
    let Some(entry) = table.lookup(code) else {
        return Err(SurveyError::CodeTableInvalid(format!(
            "code '{}' is not defined in {}",
            code.trim().to_uppercase(),
            table.name()
        )));
    };

    println!("{} ({})\n", entry.code, table.name());
    if let Some(ref desc) = entry.description {
        println!("  {}", desc);
    }
    println!("  Category: {}", category_label(entry.category));
    if entry.percent_graded {
        println!(
            "  Grade:    from recorded percentage (base grade {})",
            entry.grade
        );
    } else {
        println!("  Grade:    {}", entry.grade);
    }
    if table.is_failure_or_lining_marker(&entry.code) {
        println!("  Marker:   promotes informational codes on this section to structural");
    }
    if !entry.patterns.is_empty() {
        println!("\n  Note patterns (first match wins):");
        for p in &entry.patterns {
            let pct = if p.percent_graded { ", from percentage" } else { "" };
            println!(
                "    /{}/ -> {} grade {}{}",
                p.regex.as_str(),
                category_label(p.category),
                p.grade,
                pct
            );
        }
    }
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), SurveyError> {
    let table = rules::load_code_table(file)?;
    println!(
        "Code table '{}' (v{}) is valid: {} codes, {} percentage bands",
        table.name(),
        table.version(),
        table.definition().codes.len(),
        table.definition().percent_bands.len()
    );
    Ok(())
}

fn category_label(category: CodeCategory) -> &'static str {
    match category {
        CodeCategory::Structural => "Structural",
        CodeCategory::Service => "Service",
        CodeCategory::Informational => "Informational",
    }
}

fn join_or_none(codes: &[String]) -> String {
    if codes.is_empty() {
        "(none)".to_string()
    } else {
        codes.join(", ")
    }
}
