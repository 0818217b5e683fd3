use culvert_core::error::SurveyError;
use culvert_core::ProcessOutput;
use std::path::Path;

/// Print the output as pretty JSON. The audit trail is left out unless asked for.
pub fn print(result: &ProcessOutput, include_audit: bool) -> Result<(), SurveyError> {
    let mut value = serde_json::to_value(result)?;
    if !include_audit {
        if let Some(obj) = value.as_object_mut() {
            obj.remove("audit");
        }
    }
    let json = serde_json::to_string_pretty(&value)?;
    println!("{json}");
    Ok(())
}

pub fn write(result: &ProcessOutput, path: &Path) -> Result<(), SurveyError> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}
