use std::{io, path::{Path, PathBuf}};

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UrlListError {
    #[error("failed to read url list {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("url list {} is not a JSON array of strings: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the ordered list of URLs to post. Blank entries are dropped;
/// anything else is kept in file order.
pub async fn load_url_list(path: &Path) -> Result<Vec<String>, UrlListError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| UrlListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let entries = parse_url_list(&raw).map_err(|source| UrlListError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        target: "dispatch",
        path = %path.display(),
        total = entries.len(),
        "loaded url list"
    );
    Ok(entries)
}

fn parse_url_list(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    let entries: Vec<String> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                tracing::warn!(target: "dispatch", index, "skipping blank url entry");
                return None;
            }
            if Url::parse(trimmed).is_err() {
                tracing::warn!(
                    target: "dispatch",
                    index,
                    entry = trimmed,
                    "entry is not an absolute url; sending it as-is"
                );
            }
            Some(trimmed.to_string())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_drops_blanks() {
        let parsed =
            parse_url_list(r#"[" https://a.example/1 ", "", "https://b.example/2", "not a url"]"#)
                .unwrap();
        assert_eq!(
            parsed,
            vec!["https://a.example/1", "https://b.example/2", "not a url"]
        );
    }

    #[test]
    fn rejects_non_string_entries() {
        assert!(parse_url_list(r#"["https://a.example", 3]"#).is_err());
        assert!(parse_url_list(r#"{"urls": []}"#).is_err());
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_url_list(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, UrlListError::Read { .. }));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post_urls.json");
        std::fs::write(&path, r#"["https://a.example/1"]"#).unwrap();
        assert_eq!(
            load_url_list(&path).await.unwrap(),
            vec!["https://a.example/1"]
        );
    }
}
