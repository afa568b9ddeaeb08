use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::backend::TrackSearch;
use super::track::Track;

/// Convierte una consulta del usuario en como mucho una pista reproducible.
///
/// Un fallo de búsqueda y un resultado vacío son lo mismo para quien llama:
/// `None`, que se muestra como "not found".
pub struct TrackResolver {
    search: Arc<dyn TrackSearch>,
    search_prefix: String,
}

impl TrackResolver {
    pub fn new(search: Arc<dyn TrackSearch>, search_prefix: impl Into<String>) -> Self {
        Self {
            search,
            search_prefix: search_prefix.into(),
        }
    }

    pub async fn resolve(&self, query: &str) -> Option<Track> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        let identifier = if is_direct_url(query) {
            query.to_string()
        } else {
            format!("{}{}", self.search_prefix, query)
        };

        match self.search.search(&identifier).await {
            Ok(result) => {
                let track = result.into_first();
                match &track {
                    Some(track) => debug!("🔍 '{}' resuelto como '{}'", query, track.title()),
                    None => debug!("🔍 Sin resultados para '{}'", query),
                }
                track
            }
            Err(e) => {
                warn!("Falló la búsqueda de '{}': {}", query, e);
                None
            }
        }
    }
}

fn is_direct_url(query: &str) -> bool {
    Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{MockTrackSearch, SearchResult};
    use crate::error::BackendError;

    fn resolver(search: MockTrackSearch) -> TrackResolver {
        TrackResolver::new(Arc::new(search), "ytsearch:")
    }

    #[tokio::test]
    async fn free_text_gets_search_prefix_and_first_hit() {
        let mut search = MockTrackSearch::new();
        search
            .expect_search()
            .withf(|identifier| identifier == "ytsearch:never gonna")
            .times(1)
            .returning(|_| {
                Ok(SearchResult::Tracks(vec![
                    Track::new("a", "First"),
                    Track::new("b", "Second"),
                ]))
            });

        let track = resolver(search).resolve("  never gonna ").await;
        assert_eq!(track.map(|t| t.title().to_string()), Some("First".into()));
    }

    #[tokio::test]
    async fn urls_are_passed_through() {
        let mut search = MockTrackSearch::new();
        search
            .expect_search()
            .withf(|identifier| identifier == "https://youtu.be/dQw4w9WgXcQ")
            .times(1)
            .returning(|_| {
                Ok(SearchResult::Playlist {
                    name: "Mix".into(),
                    tracks: vec![Track::new("a", "Opening"), Track::new("b", "Closer")],
                })
            });

        let track = resolver(search).resolve("https://youtu.be/dQw4w9WgXcQ").await;
        assert_eq!(track.map(|t| t.title().to_string()), Some("Opening".into()));
    }

    #[tokio::test]
    async fn errors_and_empty_collapse_to_none() {
        let mut failing = MockTrackSearch::new();
        failing
            .expect_search()
            .returning(|_| Err(BackendError::Protocol("node down".into())));
        assert!(resolver(failing).resolve("anything").await.is_none());

        let mut empty = MockTrackSearch::new();
        empty.expect_search().returning(|_| Ok(SearchResult::Empty));
        assert!(resolver(empty).resolve("anything").await.is_none());
    }

    #[tokio::test]
    async fn blank_query_skips_search() {
        let mut search = MockTrackSearch::new();
        search.expect_search().times(0);
        assert!(resolver(search).resolve("   ").await.is_none());
    }

    #[test]
    fn url_detection() {
        assert!(is_direct_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_direct_url("http://example.com/song.mp3"));
        assert!(!is_direct_url("rick astley"));
        assert!(!is_direct_url("ytsearch:rick"));
    }
}
