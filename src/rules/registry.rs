//! Format registry: sheet name → format
//!
//! Built-in formats are embedded at compile time. A directory of extra
//! format files can be layered on top; a file whose `name` matches a
//! built-in replaces it.

use super::config::FormatConfig;
use super::format::Format;
use crate::error::{ReviewError, ReviewResult};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

const BUILTIN_FORMATS: &[(&str, &str)] = &[
    (
        "bl13-schneider-sodexo.yaml",
        include_str!("../../formats/bl13-schneider-sodexo.yaml"),
    ),
    (
        "bl20-juice-junction.yaml",
        include_str!("../../formats/bl20-juice-junction.yaml"),
    ),
    (
        "bl43-airtel.yaml",
        include_str!("../../formats/bl43-airtel.yaml"),
    ),
    (
        "bl58-schneider-coupons.yaml",
        include_str!("../../formats/bl58-schneider-coupons.yaml"),
    ),
    (
        "el13-icon-events.yaml",
        include_str!("../../formats/el13-icon-events.yaml"),
    ),
];

#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Format>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the embedded formats
    pub fn builtin() -> ReviewResult<Self> {
        let mut registry = Self::new();
        for (source, text) in BUILTIN_FORMATS {
            registry.insert(parse_format(source, text)?);
        }
        registry.check_sheets()?;
        Ok(registry)
    }

    /// Built-in formats with `dir` (if any) layered on top
    pub fn load(dir: Option<&Path>) -> ReviewResult<Self> {
        let mut registry = Self::builtin()?;
        if let Some(dir) = dir {
            let count = registry.load_dir(dir)?;
            info!(dir = %dir.display(), count, "loaded extra formats");
        }
        Ok(registry)
    }

    /// Load every `.yaml`/`.yml` file of `dir`, replacing same-named formats
    pub fn load_dir(&mut self, dir: &Path) -> ReviewResult<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            })
            .collect();
        paths.sort();

        for path in &paths {
            let text = std::fs::read_to_string(path)?;
            let format = parse_format(&path.display().to_string(), &text)?;
            debug!(format = %format.name, path = %path.display(), "format file loaded");
            self.insert(format);
        }
        self.check_sheets()?;
        Ok(paths.len())
    }

    /// Add a format, replacing any format with the same name
    pub fn insert(&mut self, format: Format) {
        self.formats.insert(format.name.clone(), format);
    }

    /// Format for a literal sheet name
    pub fn resolve(&self, sheet: &str) -> ReviewResult<&Format> {
        self.formats
            .values()
            .find(|f| f.sheets.iter().any(|s| s == sheet))
            .ok_or_else(|| ReviewError::UnknownFormat(sheet.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Format> {
        self.formats.get(name)
    }

    /// All formats, ordered by name
    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        self.formats.values()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// A sheet name may belong to one format only
    fn check_sheets(&self) -> ReviewResult<()> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for format in self.formats.values() {
            for sheet in &format.sheets {
                if let Some(other) = owners.insert(sheet.as_str(), format.name.as_str()) {
                    return Err(ReviewError::Config(format!(
                        "sheet '{}' is claimed by both '{}' and '{}'",
                        sheet, other, format.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_format(source: &str, text: &str) -> ReviewResult<Format> {
    let config: FormatConfig = serde_yaml::from_str(text)
        .map_err(|e| ReviewError::Config(format!("{}: {}", source, e)))?;
    Format::compile(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_formats_compile() {
        let registry = FormatRegistry::builtin().unwrap();
        assert_eq!(registry.len(), BUILTIN_FORMATS.len());
    }

    #[test]
    fn test_resolve_by_exact_sheet_name() {
        let registry = FormatRegistry::builtin().unwrap();
        assert_eq!(registry.resolve("Airtel Center").unwrap().name, "bl43");
        assert!(matches!(
            registry.resolve("airtel center"),
            Err(ReviewError::UnknownFormat(_))
        ));
        assert!(matches!(
            registry.resolve("Nope"),
            Err(ReviewError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_directory_overrides_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("custom.yaml"),
            "name: bl13\ntitle: Replaced\nsheets: [Custom Sheet]\n",
        )
        .unwrap();
        fs::write(dir.path().join("ignored.txt"), "not yaml").unwrap();

        let registry = FormatRegistry::load(Some(dir.path())).unwrap();
        assert_eq!(registry.len(), BUILTIN_FORMATS.len());
        assert_eq!(registry.resolve("Custom Sheet").unwrap().title, "Replaced");
        assert!(registry.resolve("Schneider Sodexo Card.").is_err());
    }

    #[test]
    fn test_sheet_claimed_twice_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("dup.yaml"),
            "name: dup\nsheets: [Airtel Center]\n",
        )
        .unwrap();
        assert!(matches!(
            FormatRegistry::load(Some(dir.path())),
            Err(ReviewError::Config(_))
        ));
    }

    #[test]
    fn test_broken_file_names_source() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.yaml"), "name: [unclosed").unwrap();
        match FormatRegistry::load(Some(dir.path())) {
            Err(ReviewError::Config(msg)) => assert!(msg.contains("broken.yaml")),
            other => panic!("expected config error, got {:?}", other.map(|r| r.len())),
        }
    }
}
