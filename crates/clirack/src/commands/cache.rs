use clirack_core::LoaderRegistry;
use miette::IntoDiagnostic;
use std::io::Write;

pub async fn list(registry: &LoaderRegistry, json: bool, out: &mut impl Write) -> miette::Result<()> {
    let entries = registry.cache().entries().await?;

    if json {
        let rendered = serde_json::to_string_pretty(&entries).into_diagnostic()?;
        writeln!(out, "{rendered}").into_diagnostic()?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(
            out,
            "No cached resources in {}",
            registry.target_dir().display()
        )
        .into_diagnostic()?;
        return Ok(());
    }

    for entry in &entries {
        let short_ref: String = entry.resolved_ref.chars().take(12).collect();
        writeln!(
            out,
            "{}  {}  {}  {}",
            entry.fetched_at.format("%Y-%m-%d %H:%M"),
            short_ref,
            entry.locator,
            entry.path.display()
        )
        .into_diagnostic()?;
    }
    Ok(())
}
