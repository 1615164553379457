use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

use crate::models::Company;

/// Loads the target list from a `.csv` or `.json` file. A malformed
/// row is reported and skipped; a missing or unreadable file is fatal
/// (nothing has been sent yet at that point).
pub fn load_companies(path: &Path) -> Result<Vec<Company>> {
    if !path.exists() {
        bail!("Fichier introuvable : {}", path.display());
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Format non supporté : {other} (utilisez .csv ou .json)"),
    }
}

fn load_csv(path: &Path) -> Result<Vec<Company>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut companies = Vec::new();
    for (i, row) in reader.deserialize::<Company>().enumerate() {
        match row {
            Ok(company) => companies.push(company),
            Err(e) => eprintln!("Ligne {} ignorée : {e}", i + 2),
        }
    }
    Ok(companies)
}

fn load_json(path: &Path) -> Result<Vec<Company>> {
    #[derive(Deserialize)]
    struct Wrapper {
        entreprises: Vec<serde_json::Value>,
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    // Either a bare array or an object with an "entreprises" key.
    let rows: Vec<serde_json::Value> = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(rows) => rows,
        Err(_) => {
            serde_json::from_str::<Wrapper>(&raw)
                .with_context(|| format!("Unrecognized JSON layout in {}", path.display()))?
                .entreprises
        }
    };

    let mut companies = Vec::new();
    for (i, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<Company>(row) {
            Ok(company) => companies.push(company),
            Err(e) => eprintln!("Entrée {} ignorée : {e}", i + 1),
        }
    }
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_with_french_headers_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entreprises.csv");
        fs::write(
            &path,
            "nom,email,ville,secteur,raison_specifique\n\
             Acme,rh@acme.fr,Nantes,infogérance,votre parc serveurs\n\
             Bidule,contact@bidule.fr,Angers,réseaux,\n",
        )
        .unwrap();

        let companies = load_companies(&path).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].name, "Acme");
        assert_eq!(companies[0].email, "rh@acme.fr");
        assert_eq!(companies[0].reason, "votre parc serveurs");
        assert_eq!(companies[1].sector, "réseaux");
    }

    #[test]
    fn json_array_and_wrapped_object_both_load() {
        let dir = tempfile::tempdir().unwrap();

        let array = dir.path().join("a.json");
        fs::write(&array, r#"[{"nom": "Acme", "email": "rh@acme.fr"}]"#).unwrap();
        let companies = load_companies(&array).unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name, "Acme");

        let wrapped = dir.path().join("w.json");
        fs::write(
            &wrapped,
            r#"{"entreprises": [{"name": "Bidule", "email": "c@bidule.fr", "ville": "Angers"}]}"#,
        )
        .unwrap();
        let companies = load_companies(&wrapped).unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].city, "Angers");
    }

    #[test]
    fn malformed_json_row_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.json");
        fs::write(
            &path,
            r#"[{"nom": "Acme", "email": "rh@acme.fr"}, 42, {"nom": "Bidule"}]"#,
        )
        .unwrap();

        let companies = load_companies(&path).unwrap();
        assert_eq!(companies.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_companies(Path::new("/nonexistent/entreprises.csv")).is_err());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entreprises.xlsx");
        fs::write(&path, b"whatever").unwrap();
        assert!(load_companies(&path).is_err());
    }
}
