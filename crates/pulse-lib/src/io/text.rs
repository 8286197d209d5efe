use anyhow::{Context, Result};
use std::path::Path;

/// Parse one sample per line, skipping blank lines and `#` comments.
/// Comma separated values on a single line are accepted too.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for field in trimmed.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let val: f64 = field
                .parse()
                .with_context(|| format!("line {} is not f64: {}", idx + 1, field))?;
            out.push(val);
        }
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a sample series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}
