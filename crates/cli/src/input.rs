use anyhow::{Context, Result};
use semantic_code_chunker::SourceDocument;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

/// Read each path into a document named after it
pub fn read_files(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    paths
        .iter()
        .map(|path| {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SourceDocument::new(content, path.display().to_string()))
        })
        .collect()
}

/// Documents as JSON on stdin
pub fn read_stdin_json() -> Result<Vec<SourceDocument>> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read stdin")?;
    parse_documents(&raw)
}

/// Accepts a JSON array of documents or a stream of objects (one per line
/// or concatenated).
pub fn parse_documents(raw: &str) -> Result<Vec<SourceDocument>> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).context("Invalid document array");
    }

    serde_json::Deserializer::from_str(raw)
        .into_iter::<SourceDocument>()
        .enumerate()
        .map(|(idx, doc)| doc.with_context(|| format!("Invalid document #{}", idx + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_delimited_objects_with_aliases() {
        let raw = "{\"pageContent\": \"const a = 1;\", \"source\": \"a.js\"}\n\
                   {\"content\": \"let b;\", \"source_path\": \"b.ts\", \"metadata\": {\"repo\": \"x\"}}\n";
        let docs = parse_documents(raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_path, "a.js");
        assert_eq!(docs[1].metadata["repo"], "x");
    }

    #[test]
    fn parses_arrays() {
        let docs = parse_documents(r#"[{"content": "x", "path": "x.js"}]"#).unwrap();
        assert_eq!(docs[0].content, "x");
        assert_eq!(docs[0].source_path, "x.js");
    }

    #[test]
    fn reports_the_broken_document() {
        let err = parse_documents("{\"content\": \"ok\"}\n{\"content\": 3}\n").unwrap_err();
        assert!(err.to_string().contains("#2"));
    }

    #[test]
    fn blank_input_has_no_documents() {
        assert!(parse_documents("  \n").unwrap().is_empty());
    }
}
