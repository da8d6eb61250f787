use crate::index::VectorIndex;
use crate::tokenizer::Tokenizer;
use crate::DocId;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extra text indexed under a document with its own base weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedField {
    pub text: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDoc {
    pub id: DocId,
    pub name: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub fields: Vec<WeightedField>,
}

impl InputDoc {
    pub fn new(id: DocId, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self { id, name: name.into(), body: body.into(), fields: Vec::new() }
    }

    /// Rejects non-positive or non-finite field weights.
    pub fn validate(&self) -> Result<()> {
        for field in &self.fields {
            if !field.weight.is_finite() || field.weight <= 0.0 {
                bail!("document {}: field weight must be positive, got {}", self.id, field.weight);
            }
        }
        Ok(())
    }
}

/// Load documents from a `.json` file (array or single object), a `.jsonl`
/// file, or a directory containing either.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<InputDoc>> {
    let path = path.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        bail!("corpus path {} does not exist", path.display());
    }

    let mut docs = Vec::new();
    for file in files {
        let loaded = if extension(&file) == Some("jsonl") { load_jsonl(&file) } else { load_json(&file) };
        docs.extend(loaded.with_context(|| format!("loading {}", file.display()))?);
    }
    tracing::info!(path = %path.display(), num_docs = docs.len(), "loaded corpus");
    Ok(docs)
}

fn extension(path: &Path) -> Option<&str> { path.extension().and_then(|s| s.to_str()) }

fn load_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line).with_context(|| format!("line {}", lineno + 1))?;
        doc.validate()?;
        docs.push(doc);
    }
    Ok(docs)
}

fn load_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs: Vec<InputDoc> = match json {
        serde_json::Value::Array(_) => serde_json::from_value(json)?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => bail!("expected a document object or an array of documents"),
    };
    for doc in &docs {
        doc.validate()?;
    }
    Ok(docs)
}

/// Upserts the body at weight 1, then each field at its own weight. Weights
/// are left for a later bulk recompute.
pub fn upsert_input_doc<T: Tokenizer>(index: &mut VectorIndex<T>, doc: &InputDoc) {
    let fields = std::iter::once((doc.body.as_str(), 1.0))
        .chain(doc.fields.iter().map(|f| (f.text.as_str(), f.weight)));
    index.upsert_weighted_fields(doc.id, &doc.name, fields);
}

/// Upserts every document and recomputes all weights once at the end.
pub fn ingest_corpus<T: Tokenizer>(index: &mut VectorIndex<T>, docs: &[InputDoc]) -> usize {
    for doc in docs {
        upsert_input_doc(index, doc);
    }
    index.recompute_all_weights();
    docs.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_json_jsonl_and_directories() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"[{"id": 1, "name": "one", "body": "hello"}, {"id": 2, "name": "two", "body": "hi"}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.jsonl"),
            "{\"id\": 3, \"name\": \"three\", \"body\": \"hi there\"}\n\n{\"id\": 4, \"name\": \"four\", \"fields\": [{\"text\": \"hey\", \"weight\": 0.4}]}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let docs = load_corpus(dir.path()).unwrap();
        let ids: Vec<DocId> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(docs[3].fields[0].weight, 0.4);
        assert!(docs[3].body.is_empty());

        let single = dir.path().join("single.json");
        fs::write(&single, r#"{"id": 9, "name": "nine", "body": "x"}"#).unwrap();
        assert_eq!(load_corpus(&single).unwrap().len(), 1);
    }

    #[test]
    fn rejects_bad_input() {
        let dir = tempdir().unwrap();
        let weights = dir.path().join("w.json");
        fs::write(&weights, r#"{"id": 1, "name": "x", "fields": [{"text": "a", "weight": 0}]}"#).unwrap();
        assert!(load_corpus(&weights).is_err());

        let scalar = dir.path().join("s.json");
        fs::write(&scalar, "42").unwrap();
        assert!(load_corpus(&scalar).is_err());

        assert!(load_corpus(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn ingest_weights_fields() {
        let mut doc = InputDoc::new(1, "repo", "ruby library");
        doc.fields.push(WeightedField { text: "octocat".into(), weight: 0.2 });
        let mut index = VectorIndex::new();
        assert_eq!(ingest_corpus(&mut index, &[doc, InputDoc::new(2, "other", "ruby gem")]), 2);
        let v = index.get_document_vector(1).unwrap();
        assert_eq!(v.base_weights["octocat"], 0.2);
        assert_eq!(index.document_frequency("ruby"), 2);
        // ruby is in every document
        assert_eq!(v.dimension_lengths["ruby"], 0.0);
    }
}
