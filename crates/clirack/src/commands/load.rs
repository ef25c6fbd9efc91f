use clirack_core::{LoadedDataMeta, LoaderRegistry, require_dir};
use miette::IntoDiagnostic;
use std::io::Write;
use tracing::instrument;

#[instrument(skip(registry, out))]
pub async fn execute(
    registry: &LoaderRegistry,
    locator: &str,
    required_dir: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> miette::Result<()> {
    let meta = match required_dir {
        Some(dir) => registry.load_with(locator, &require_dir(dir.to_owned())).await?,
        None => registry.load(locator).await?,
    };

    if json {
        let rendered = serde_json::to_string_pretty(&meta).into_diagnostic()?;
        writeln!(out, "{rendered}").into_diagnostic()?;
    } else {
        write_summary(&meta, out).into_diagnostic()?;
    }
    Ok(())
}

fn write_summary(meta: &LoadedDataMeta, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{}", meta.target_path().display())?;
    writeln!(out, "  locator:  {}", meta.locator)?;
    writeln!(out, "  root:     {}", meta.path.display())?;
    if let Some(resolved) = &meta.resolved_ref {
        writeln!(out, "  ref:      {resolved}")?;
    }
    writeln!(
        out,
        "  source:   {}",
        if meta.from_cache { "cache" } else { "fetched" }
    )?;
    writeln!(out, "  kind:     {}", if meta.is_file { "file" } else { "directory" })?;
    writeln!(out, "  fetched:  {}", meta.fetched_at.to_rfc3339())
}
