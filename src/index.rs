//! Simple-repository listing pages.
//!
//! `GET /` renders the root index; `GET /<project>/` renders the per-project
//! page with one link per stored artifact. Links carry `#sha256=` fragments
//! so installers can verify downloads.

use axum::response::Html;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::naming;
use crate::state::AppState;
use crate::storage::{Key, Storage};

/// Render the listing page for a request path.
///
/// The root path lists every stored artifact; any other path lists the keys
/// under its prefix, with the last segment canonicalized so all spellings
/// of a project name reach the same listing.
pub async fn listing(state: &AppState, path: &str) -> AppResult<Html<String>> {
    let prefix = listing_prefix(path)?;
    info!(prefix = %prefix, "Generating index listing");

    let keys = state.store.list(&prefix).await?;
    let title = if prefix.is_empty() {
        "Simple index".to_string()
    } else {
        format!("Links for {}", prefix.last_part())
    };

    let mut html = format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>{title}</title></head>
  <body>
    <h1>{title}</h1>
"#
    );
    for key in keys {
        let digest = crate::sha256_hash(&state.store.get(&key).await?);
        let filename = key.last_part();
        debug!(key = %key, "Added file to index listing");
        html.push_str(&format!(
            "    <a href=\"/{key}#sha256={digest}\">{filename}</a><br/>\n"
        ));
    }
    html.push_str("  </body>\n</html>");
    Ok(Html(html))
}

fn listing_prefix(path: &str) -> AppResult<Key> {
    let key = Key::from_path(path)?;
    if key.is_empty() {
        return Ok(key);
    }
    let normalized = naming::canonicalize(key.last_part())?;
    let parent = key
        .as_str()
        .rsplit_once('/')
        .map(|(head, _)| head.to_string())
        .unwrap_or_default();
    Ok(Key::from_segments([parent.as_str(), normalized.as_str()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::FsStorage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let state = AppState {
            store: Arc::new(FsStorage::new(dir.path())),
            config: Arc::new(Config::default()),
            proxy: None,
        };
        (state, dir)
    }

    #[tokio::test]
    async fn project_listing_links_files_with_hashes() {
        let (state, _dir) = test_state();
        let key = Key::from_segments(["my-project", "my_project-1.0-py3-none-any.whl"]);
        state.store.put(&key, b"wheel bytes").await.unwrap();

        let Html(page) = listing(&state, "/My_Project/").await.unwrap();
        assert!(page.contains("Links for my-project"));
        assert!(page.contains("my_project-1.0-py3-none-any.whl"));
        assert!(page.contains("#sha256="));
    }

    #[tokio::test]
    async fn root_listing_covers_all_projects() {
        let (state, _dir) = test_state();
        state
            .store
            .put(&Key::from_segments(["proj-a", "proj_a-1.0.tar.gz"]), b"a")
            .await
            .unwrap();
        state
            .store
            .put(&Key::from_segments(["proj-b", "proj_b-2.0.tar.gz"]), b"b")
            .await
            .unwrap();

        let Html(page) = listing(&state, "/").await.unwrap();
        assert!(page.contains("Simple index"));
        assert!(page.contains("proj_a-1.0.tar.gz"));
        assert!(page.contains("proj_b-2.0.tar.gz"));
    }

    #[tokio::test]
    async fn unknown_project_renders_empty_page() {
        let (state, _dir) = test_state();
        let Html(page) = listing(&state, "/nothing-here/").await.unwrap();
        assert!(page.contains("Links for nothing-here"));
        assert!(!page.contains("<a href"));
    }
}
