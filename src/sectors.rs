//! Sector keyword table used by harvest mode.
//!
//! Each sector is queried with the phrase formed from its first two
//! keywords. The built-in table can be replaced by a text file with one
//! `Sector = keyword, keyword, ...` line per sector; blank lines and lines
//! starting with `#` are ignored.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Built-in sectors and their seed keywords.
const DEFAULT_SECTORS: &[(&str, &[&str])] = &[
    ("Agriculture", &["agriculture", "farm", "crop", "irrigation", "livestock", "horticulture"]),
    ("Health", &["health", "medicine", "public health", "clinic", "hospital", "malaria", "immunization", "epidemic"]),
    ("Education", &["education", "school", "curriculum", "teacher", "university", "learning", "literacy"]),
    ("Infrastructure", &["infrastructure", "road", "bridge", "rail", "telecom", "water supply", "sewerage", "construction"]),
    ("Tourism", &["tourism", "tourist", "hotel", "hospitality", "heritage", "ecotourism"]),
    ("Energy", &["energy", "power", "renewable", "solar", "wind", "hydro", "electricity"]),
    ("Mining", &["mining", "minerals", "ore", "copper", "extraction", "quarry"]),
    ("Manufacturing", &["manufacturing", "factory", "industrial", "production", "assembly", "process engineering"]),
    ("Environment", &["environment", "biodiversity", "climate", "conservation", "pollution", "ecosystem"]),
    ("ICT/Technology", &["technology", "information technology", "ict", "computer", "software", "hardware", "ai", "sensor"]),
    ("Governance", &["governance", "policy", "administration", "regulation", "legislation"]),
    ("Finance/Trade", &["finance", "bank", "trade", "export", "import", "economy", "microfinance"]),
    ("Transport", &["transport", "logistics", "airport", "port", "shipping", "freight"]),
    ("Water_and_Sanitation", &["water", "sanitation", "wastewater", "hygiene", "drinking water"]),
];

/// Keywords used to form the query phrase.
const QUERY_KEYWORDS: usize = 2;

/// Errors loading a sectors file.
#[derive(Debug, Error)]
pub enum SectorsError {
    /// The file could not be read.
    #[error("failed to read sectors file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line is not `Sector = keywords`.
    #[error("line {line}: expected 'Sector = keyword, keyword', got '{content}'")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// Offending line.
        content: String,
    },

    /// The file defines no sectors.
    #[error("sectors file defines no sectors")]
    Empty,
}

/// A labelled group of search keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Sector {
    /// Search phrase: the first two keywords joined by a space.
    #[must_use]
    pub fn query_phrase(&self) -> String {
        self.keywords
            .iter()
            .take(QUERY_KEYWORDS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The built-in sector table, in its fixed order.
#[must_use]
pub fn default_sectors() -> Vec<Sector> {
    DEFAULT_SECTORS
        .iter()
        .map(|(name, keywords)| Sector {
            name: (*name).to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        })
        .collect()
}

/// Parses sector definitions, keeping file order.
///
/// # Errors
///
/// Returns [`SectorsError::Syntax`] for a malformed line and
/// [`SectorsError::Empty`] when nothing is defined.
pub fn parse_sectors(text: &str) -> Result<Vec<Sector>, SectorsError> {
    let mut sectors = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let syntax = || SectorsError::Syntax {
            line: index + 1,
            content: line.to_string(),
        };
        let (name, keywords) = line.split_once('=').ok_or_else(syntax)?;
        let name = name.trim();
        let keywords: Vec<String> = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if name.is_empty() || keywords.is_empty() {
            return Err(syntax());
        }
        sectors.push(Sector {
            name: name.to_string(),
            keywords,
        });
    }
    if sectors.is_empty() {
        return Err(SectorsError::Empty);
    }
    Ok(sectors)
}

/// Reads and parses a sectors file.
///
/// # Errors
///
/// Returns [`SectorsError`] on IO or syntax failure.
pub fn load_sectors_file(path: &Path) -> Result<Vec<Sector>, SectorsError> {
    let text = std::fs::read_to_string(path).map_err(|source| SectorsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sectors(&text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_order_and_phrases() {
        let sectors = default_sectors();
        assert_eq!(sectors.len(), 14);
        assert_eq!(sectors[0].name, "Agriculture");
        assert_eq!(sectors[0].query_phrase(), "agriculture farm");
        assert_eq!(sectors[13].name, "Water_and_Sanitation");
        assert_eq!(sectors[9].query_phrase(), "technology information technology");
    }

    #[test]
    fn test_parse_sectors_file_format() {
        let text = "# custom\n\nSolar = solar, photovoltaic , grid\nWater=water\n";
        let sectors = parse_sectors(text).unwrap();
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].keywords, vec!["solar", "photovoltaic", "grid"]);
        assert_eq!(sectors[0].query_phrase(), "solar photovoltaic");
        assert_eq!(sectors[1].query_phrase(), "water");
    }

    #[test]
    fn test_parse_sectors_rejects_bad_lines() {
        assert!(matches!(
            parse_sectors("Solar solar"),
            Err(SectorsError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse_sectors("ok = a\n = b"),
            Err(SectorsError::Syntax { line: 2, .. })
        ));
        assert!(matches!(parse_sectors("# nothing\n"), Err(SectorsError::Empty)));
    }
}
