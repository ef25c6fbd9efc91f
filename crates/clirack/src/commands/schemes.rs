use clirack_core::LoaderRegistry;
use miette::IntoDiagnostic;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct SchemeInfo<'a> {
    scheme: &'a str,
    loader: &'static str,
    description: &'static str,
}

pub fn execute(registry: &LoaderRegistry, json: bool, out: &mut impl Write) -> miette::Result<()> {
    let schemes: Vec<SchemeInfo<'_>> = registry
        .iter()
        .map(|(scheme, loader)| SchemeInfo {
            scheme,
            loader: loader.name(),
            description: loader.description(),
        })
        .collect();

    if json {
        let rendered = serde_json::to_string_pretty(&schemes).into_diagnostic()?;
        writeln!(out, "{rendered}").into_diagnostic()?;
        return Ok(());
    }

    for info in &schemes {
        writeln!(
            out,
            "{:<8} {:<8} {}",
            info.scheme, info.loader, info.description
        )
        .into_diagnostic()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clirack_core::LoaderConfig;

    #[test]
    fn test_lists_builtin_scheme() {
        let registry = LoaderRegistry::with_builtin_loaders(LoaderConfig::default());
        let mut out = Vec::new();
        execute(&registry, false, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("local"));
        assert!(text.contains("local filesystem"));
    }

    #[test]
    fn test_json_listing() {
        let registry = LoaderRegistry::with_builtin_loaders(LoaderConfig::default());
        let mut out = Vec::new();
        execute(&registry, true, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["scheme"], "local");
        assert_eq!(value[0]["loader"], "local");
    }
}
