use super::*;
use crate::error::HangarError;
use crate::model::{OperatingSystem, Product};
use crate::store::{KeyValues, PropertyStore, property};
use crate::testing::{FakeMetadataSource, dlc, game, link, pack, server_for};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn cached_source(root: &Path, fake: FakeMetadataSource) -> (CachedMetadataSource, Arc<PropertyStore>) {
    let properties = Arc::new(PropertyStore::open(root.join("properties")).unwrap());
    let source = CachedMetadataSource::new(
        Box::new(fake),
        KeyValues::open(root.join("products")).unwrap(),
        properties.clone(),
    );
    (source, properties)
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[cfg(test)]
mod flatten_tests {
    use super::*;

    #[test]
    fn games_only_is_a_fixed_point() {
        let step = flatten_step(&[game("1", "One"), game("2", "Two"), game("1", "One")]);
        assert!(!step.flattened);
        assert_eq!(step.ids, ids(&["1", "2"]));
        assert!(step.skipped_dlcs.is_empty());
    }

    #[test]
    fn packs_expand_in_order_without_duplicates() {
        let step = flatten_step(&[
            game("2", "Two"),
            pack("10", "Bundle", &["1", "2", "3"]),
            dlc("20", "Extra Content", &["1"]),
        ]);
        assert!(step.flattened);
        assert_eq!(step.ids, ids(&["2", "1", "3"]));
        assert_eq!(step.skipped_dlcs, ids(&["20"]));
    }

    #[test]
    fn only_dlcs_resolve_to_nothing() {
        let step = flatten_step(&[dlc("20", "Extra Content", &["1"])]);
        assert!(step.ids.is_empty());
        assert!(!step.flattened);
    }
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[tokio::test]
    async fn nested_packs_resolve_to_games() {
        let dir = tempdir().unwrap();
        let fake = FakeMetadataSource::new([
            pack("100", "Mega Bundle", &["10", "3"]),
            pack("10", "Bundle", &["1", "2"]),
            game("1", "One"),
            game("2", "Two"),
            game("3", "Three"),
        ]);
        let (source, _) = cached_source(dir.path(), fake);

        let resolved = resolve_games(&source, &ids(&["100"]), false).await.unwrap();
        assert_eq!(resolved.games, ids(&["1", "2", "3"]));
        assert_eq!(resolved.rounds, 3);
    }

    #[tokio::test]
    async fn self_including_pack_terminates() {
        let dir = tempdir().unwrap();
        let fake = FakeMetadataSource::new([pack("10", "Loop", &["10", "1"]), game("1", "One")]);
        let (source, _) = cached_source(dir.path(), fake);

        let resolved = resolve_games(&source, &ids(&["10"]), false).await.unwrap();
        assert_eq!(resolved.games, ids(&["1"]));
    }

    fn pack_chain(depth: usize) -> Vec<Product> {
        let mut products = vec![game("1", "One")];
        for level in 1..=depth {
            let included = if level == 1 { "1".to_string() } else { format!("p{}", level - 1) };
            products.push(pack(&format!("p{}", level), "Bundle", &[included.as_str()]));
        }
        products
    }

    #[tokio::test]
    async fn deepest_allowed_nesting_resolves() {
        let dir = tempdir().unwrap();
        let depth = MAX_ROUNDS - 1;
        let (source, _) = cached_source(dir.path(), FakeMetadataSource::new(pack_chain(depth)));

        let resolved = resolve_games(&source, &[format!("p{}", depth)], false).await.unwrap();
        assert_eq!(resolved.games, ids(&["1"]));
        assert_eq!(resolved.rounds, MAX_ROUNDS);
    }

    #[tokio::test]
    async fn nesting_beyond_the_round_limit_is_an_error() {
        let dir = tempdir().unwrap();
        let depth = MAX_ROUNDS + 4;
        let (source, _) = cached_source(dir.path(), FakeMetadataSource::new(pack_chain(depth)));

        let err = resolve_games(&source, &[format!("p{}", depth)], false).await.unwrap_err();
        assert!(matches!(err, HangarError::Configuration { ref message, .. } if message.contains("nested deeper")));
    }

    #[tokio::test]
    async fn dlcs_are_reported_as_skipped() {
        let dir = tempdir().unwrap();
        let fake = FakeMetadataSource::new([game("1", "One"), dlc("20", "Extra Content", &["1"])]);
        let (source, _) = cached_source(dir.path(), fake);

        let resolved = resolve_games(&source, &ids(&["1", "20"]), false).await.unwrap();
        assert_eq!(resolved.games, ids(&["1"]));
        assert_eq!(resolved.skipped_dlcs, ids(&["20"]));
    }

    #[tokio::test]
    async fn unknown_id_is_an_error() {
        let dir = tempdir().unwrap();
        let (source, _) = cached_source(dir.path(), FakeMetadataSource::default());

        let err = resolve_games(&source, &ids(&["404"]), false).await.unwrap_err();
        assert!(matches!(err, HangarError::MissingMetadata { ref id, .. } if id == "404"));
    }

    #[tokio::test]
    async fn supported_keeps_ids_with_a_matching_installer() {
        let dir = tempdir().unwrap();
        let mut linux = game("1", "Linux Game");
        linux.download_links = vec![link(OperatingSystem::Linux, "game.sh", b"x")];
        let mut windows = game("2", "Windows Game");
        windows.download_links = vec![link(OperatingSystem::Windows, "setup.exe", b"x")];
        let (source, _) = cached_source(dir.path(), FakeMetadataSource::new([linux, windows]));

        let supported = filter_supported(&source, &ids(&["1", "2"]), OperatingSystem::Linux, "en", false)
            .await
            .unwrap();
        assert_eq!(supported, ids(&["1"]));

        let german = filter_supported(&source, &ids(&["1"]), OperatingSystem::Linux, "de", false)
            .await
            .unwrap();
        assert!(german.is_empty());
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn cached_products_are_not_fetched_again() {
        let dir = tempdir().unwrap();
        let fake = FakeMetadataSource::new([game("1", "One")]);
        let (source, _) = cached_source(dir.path(), fake.clone());

        source.product("1", false).await.unwrap();
        source.product("1", false).await.unwrap();
        assert_eq!(fake.calls(), 1);

        source.product("1", true).await.unwrap();
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn fetch_pins_title_slug_and_steam_app_id() {
        let dir = tempdir().unwrap();
        let mut product = game("1", "Sample Game");
        product.steam_app_id = Some("4242".to_string());
        let (source, properties) = cached_source(dir.path(), FakeMetadataSource::new([product]));

        source.product("1", false).await.unwrap();

        assert_eq!(
            properties.get_last_value(property::TITLE, "1").unwrap(),
            Some("Sample Game".to_string())
        );
        assert_eq!(
            properties.get_last_value(property::SLUG, "1").unwrap(),
            Some("sample_game".to_string())
        );
        assert_eq!(
            properties.get_last_value(property::STEAM_APP_ID, "1").unwrap(),
            Some("4242".to_string())
        );
        assert!(source.cached("1").unwrap().is_some());
        assert!(source.cached("2").unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_cache_entry() {
        let dir = tempdir().unwrap();
        let (source, properties) = cached_source(dir.path(), FakeMetadataSource::default());

        assert!(source.product("1", false).await.is_err());
        assert!(source.cached("1").unwrap().is_none());
        assert!(!properties.has_key(property::TITLE, "1").unwrap());
    }
}

#[cfg(test)]
mod http_source_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_source(server: &MockServer) -> HttpMetadataSource {
        HttpMetadataSource::new(reqwest::Client::new(), server_for(server)).with_max_retries(1)
    }

    #[tokio::test]
    async fn decodes_product_json() {
        let server = MockServer::start().await;
        let product = game("1", "Sample Game");
        Mock::given(method("GET"))
            .and(path("/api/metadata"))
            .and(query_param("id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(serde_json::to_string(&product).unwrap()))
            .mount(&server)
            .await;

        let fetched: Product = http_source(&server).fetch("1").await.unwrap();
        assert_eq!(fetched, product);
    }

    #[tokio::test]
    async fn not_found_is_missing_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metadata"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = http_source(&server).fetch("1").await.unwrap_err();
        assert!(matches!(err, HangarError::MissingMetadata { .. }));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metadata"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = http_source(&server).fetch("1").await.unwrap_err();
        assert!(matches!(err, HangarError::HttpStatus { status: 503, .. }));
    }
}
