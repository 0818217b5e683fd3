use culvert_core::error::SurveyError;
use culvert_core::pricing::{
    find_gaps, find_overlaps, load_pricing, PricingConfiguration, PricingStore,
};
use std::path::Path;

pub fn validate(file: &Path) -> Result<(), SurveyError> {
    let config = load_pricing(file)?;
    print_summary(&config);

    let gaps = find_gaps(&config);
    let overlaps = find_overlaps(&config);
    if gaps.is_empty() && overlaps.is_empty() {
        println!("\nRanges are contiguous.");
        return Ok(());
    }

    if !gaps.is_empty() {
        println!("\nUncovered values (sections here will be unmatched):");
        for gap in &gaps {
            println!(
                "  between '{}' and '{}': {} .. {} (exclusive)",
                gap.after, gap.before, gap.from, gap.to
            );
        }
    }
    if !overlaps.is_empty() {
        println!("\nOverlapping ranges (first declared wins):");
        for o in &overlaps {
            println!("  '{}' shadows '{}'", o.winner, o.shadowed);
        }
    }
    Ok(())
}

pub fn import(file: &Path, store: &Path) -> Result<(), SurveyError> {
    let config = load_pricing(file)?;
    let store = PricingStore::open(store)?;
    let saved = store.save(config)?;
    println!(
        "Stored '{}' as version {} (now current)",
        saved.name, saved.version
    );
    Ok(())
}

pub fn show(store: &Path, version: Option<u32>) -> Result<(), SurveyError> {
    let store = PricingStore::open(store)?;
    let config = match version {
        Some(v) => store.get_version(v)?,
        None => store.current()?,
    };
    match config {
        Some(config) => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        None => match version {
            Some(v) => println!("No pricing configuration version {v}"),
            None => println!("No pricing configuration stored"),
        },
    }
    Ok(())
}

pub fn history(store: &Path) -> Result<(), SurveyError> {
    let store = PricingStore::open(store)?;
    let versions = store.list_versions()?;
    if versions.is_empty() {
        println!("No pricing configuration stored");
        return Ok(());
    }
    println!("  {:>7}  {:<19}  Name", "Version", "Saved");
    for info in versions {
        let marker = if info.current { " (current)" } else { "" };
        println!(
            "  {:>7}  {:<19}  {}{}",
            info.version, info.updated_at, info.name, marker
        );
    }
    Ok(())
}

pub fn activate(store: &Path, version: u32) -> Result<(), SurveyError> {
    let store = PricingStore::open(store)?;
    store.set_current(version)?;
    println!("Version {version} is now current");
    Ok(())
}

fn print_summary(config: &PricingConfiguration) {
    println!(
        "Pricing '{}': compare by {}, cost = value {} {}",
        config.name, config.comparison, config.operator, config.operand
    );
    for (rule, value) in config.ranges.iter().zip(&config.values) {
        let state = if rule.enabled { "" } else { "  (disabled)" };
        println!(
            "  {:<12} {:>8} - {:<8} -> {}{}",
            rule.label, rule.start, rule.end, value, state
        );
    }
    if let Some(travel) = config.travel_add_on() {
        if !travel.is_zero() {
            println!("  Travel add-on per section: {}", travel);
        }
    }
}
