//! Study catalog: the protocol numbers findings may be raised against.
//!
//! The catalog is a CSV kept next to the workbook. Only the protocol number
//! and study name columns are read; any other column is ignored.

use serde::Serialize;

use crate::storage::RemoteStore;
use crate::{Error, Result};

pub const CODE_COLUMN: &str = "NUMERO_DO_PROTOCOLO";
pub const NAME_COLUMN: &str = "NOME_DA_PESQUISA";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Study {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyCatalog {
    studies: Vec<Study>,
}

impl StudyCatalog {
    /// Parse catalog CSV bytes.
    ///
    /// Rows with a blank protocol number are skipped. When a code repeats,
    /// the first row wins.
    pub fn parse_csv(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|error| Error::InvalidInput(format!("study catalog is not UTF-8: {error}")))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
        let header = lines
            .next()
            .map(parse_csv_row)
            .ok_or_else(|| Error::InvalidInput("study catalog is empty".to_string()))?;
        let position = |name: &str| {
            header
                .iter()
                .position(|column| column.trim() == name)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("study catalog has no {name} column"))
                })
        };
        let code_at = position(CODE_COLUMN)?;
        let name_at = position(NAME_COLUMN)?;

        let mut catalog = Self::default();
        for line in lines {
            let row = parse_csv_row(line);
            let cell = |index: usize| row.get(index).map_or("", |value| value.trim());
            let code = cell(code_at);
            if code.is_empty() || catalog.find(code).is_some() {
                continue;
            }
            catalog.studies.push(Study {
                code: code.to_string(),
                name: cell(name_at).to_string(),
            });
        }
        Ok(catalog)
    }

    /// Download and parse the catalog at `path`.
    pub async fn load<S: RemoteStore>(store: &S, path: &str) -> Result<Self> {
        let bytes = store.download(path).await?;
        let catalog = Self::parse_csv(&bytes)?;
        tracing::info!(path, studies = catalog.len(), "Loaded study catalog");
        Ok(catalog)
    }

    /// Look a protocol number up, ignoring surrounding space and ASCII case.
    pub fn find(&self, code: &str) -> Option<&Study> {
        let code = code.trim();
        self.studies
            .iter()
            .find(|study| study.code.eq_ignore_ascii_case(code))
    }

    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }
}

// Quoted fields may hold commas and doubled quotes, but not line breaks.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFileStore;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = "\u{feff}NUMERO_DO_PROTOCOLO,NOME_DA_PESQUISA,PATROCINADOR\r\n\
        BE-101/24,\"Bioequivalência, dose única\",Lab A\r\n\
        ,sem código,Lab B\r\n\
        BE-202/24,\"Estudo \"\"piloto\"\"\",Lab C\r\n\
        be-101/24,duplicado,Lab D\r\n";

    #[test]
    fn parse_csv_reads_codes_and_names() {
        let catalog = StudyCatalog::parse_csv(CATALOG.as_bytes()).unwrap();

        assert_eq!(
            catalog.studies(),
            &[
                Study {
                    code: "BE-101/24".to_string(),
                    name: "Bioequivalência, dose única".to_string(),
                },
                Study {
                    code: "BE-202/24".to_string(),
                    name: "Estudo \"piloto\"".to_string(),
                },
            ]
        );
    }

    #[test]
    fn find_ignores_case_and_padding() {
        let catalog = StudyCatalog::parse_csv(CATALOG.as_bytes()).unwrap();

        assert_eq!(
            catalog.find(" be-202/24 ").map(|study| study.code.as_str()),
            Some("BE-202/24")
        );
        assert!(catalog.find("BE-999/24").is_none());
    }

    #[test]
    fn parse_csv_requires_both_columns() {
        let error = StudyCatalog::parse_csv(b"NUMERO_DO_PROTOCOLO,OUTRA\nBE-1,x\n").unwrap_err();
        assert!(error.to_string().contains(NAME_COLUMN));

        assert!(StudyCatalog::parse_csv(b"").is_err());
        assert!(StudyCatalog::parse_csv(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn load_reads_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf());
        store
            .upload("QA/estudos.csv", CATALOG.as_bytes(), true)
            .await
            .unwrap();

        let catalog = StudyCatalog::load(&store, "QA/estudos.csv").await.unwrap();
        assert_eq!(catalog.len(), 2);

        let missing = StudyCatalog::load(&store, "QA/nada.csv").await.unwrap_err();
        assert!(matches!(missing, Error::Remote(_)));
    }
}
