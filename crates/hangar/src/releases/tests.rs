use super::*;
use crate::install::InstallerRegistry;
use crate::testing::{FakeMetadataSource, FakeTransport, context};
use tempfile::tempdir;

fn release(tag: &str, assets: &[&str]) -> GitHubRelease {
    GitHubRelease {
        tag_name: tag.to_string(),
        name: Some(tag.to_string()),
        assets: assets
            .iter()
            .map(|name| GitHubAsset {
                name: name.to_string(),
                browser_download_url: format!("https://github.test/{}/{}", tag, name),
                size: 10,
            })
            .collect(),
    }
}

fn newest_first() -> Vec<GitHubRelease> {
    vec![
        release("v3", &["proton-v3.tar.gz"]),
        release("v2", &["proton-v2.tar.gz"]),
        release("v1", &["proton-v1.tar.gz"]),
    ]
}

fn linux_context(root: &std::path::Path, transport: FakeTransport) -> Context {
    context(
        root,
        OperatingSystem::Linux,
        FakeMetadataSource::default(),
        transport,
        InstallerRegistry::new(),
    )
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    fn tags(selected: Vec<&GitHubRelease>) -> Vec<&str> {
        selected.into_iter().map(|r| r.tag_name.as_str()).collect()
    }

    #[test]
    fn empty_selector_picks_newest() {
        let releases = newest_first();
        assert_eq!(tags(ReleaseSelector::new().select(&PROTON_GE, &releases)), vec!["v3"]);
    }

    #[test]
    fn all_picks_every_release() {
        let releases = newest_first();
        assert_eq!(
            tags(ReleaseSelector::new().all(true).select(&PROTON_GE, &releases)),
            vec!["v3", "v2", "v1"]
        );
    }

    #[test]
    fn tags_match_exactly() {
        let releases = newest_first();
        assert_eq!(tags(ReleaseSelector::new().tags(["v2"]).select(&PROTON_GE, &releases)), vec!["v2"]);
        assert!(ReleaseSelector::new().tags(["v"]).select(&PROTON_GE, &releases).is_empty());
    }

    #[test]
    fn owner_and_repo_filter_sources() {
        let releases = newest_first();
        assert!(ReleaseSelector::new().owner("Gcenx").select(&PROTON_GE, &releases).is_empty());
        assert!(ReleaseSelector::new().repo("umu-launcher").select(&PROTON_GE, &releases).is_empty());
        assert_eq!(
            tags(ReleaseSelector::new().owner("GloriousEggroll").select(&PROTON_GE, &releases)),
            vec!["v3"]
        );
    }

    #[test]
    fn sources_per_host() {
        assert_eq!(sources(OperatingSystem::Linux), &[PROTON_GE, UMU_LAUNCHER]);
        assert_eq!(sources(OperatingSystem::MacOS), &[MACOS_WINE]);
        assert!(sources(OperatingSystem::Windows).is_empty());
    }
}

#[cfg(test)]
mod asset_tests {
    use super::*;

    #[test]
    fn single_asset_is_used_directly() {
        let release = release("v1", &["checksums.txt"]);
        assert_eq!(select_asset(&PROTON_GE, &release).unwrap().name, "checksums.txt");
    }

    #[test]
    fn first_matching_asset_wins() {
        let release = release("v1", &["GE-Proton9-1.sha512sum", "GE-Proton9-1.tar.gz", "other.tar.gz"]);
        assert_eq!(select_asset(&PROTON_GE, &release).unwrap().name, "GE-Proton9-1.tar.gz");
    }

    #[test]
    fn no_match_is_asset_not_found() {
        let release = release("v1", &["a.zip", "b.zip"]);
        match select_asset(&UMU_LAUNCHER, &release) {
            Err(HangarError::AssetNotFound { repo, release, pattern }) => {
                assert_eq!(repo, "Open-Wine-Components/umu-launcher");
                assert_eq!(release, "v1");
                assert_eq!(pattern, "zipapp.tar");
            }
            other => panic!("expected AssetNotFound, got {:?}", other),
        }
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize("Wine 9.0: stable/devel"), "Wine 9.0_ stable_devel");
        assert_eq!(sanitize("..hidden.."), "hidden");
        assert_eq!(sanitize("a\tb"), "a_b");
    }

    #[test]
    fn unnamed_release_uses_tag() {
        let mut release = release("v9", &[]);
        release.name = Some("  ".to_string());
        assert_eq!(release.display_name(), "v9");
        assert_eq!(release.dir_name(), "v9");
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROTON_RELEASES: &str = r#"[
        {"tag_name": "GE-Proton9-2", "name": "GE-Proton9-2", "draft": false,
         "assets": [
            {"name": "GE-Proton9-2.sha512sum", "browser_download_url": "https://github.test/p2/sum", "size": 1},
            {"name": "GE-Proton9-2.tar.gz", "browser_download_url": "https://github.test/p2/tar", "size": 5}
         ]},
        {"tag_name": "GE-Proton9-1", "name": "GE-Proton9-1",
         "assets": [
            {"name": "GE-Proton9-1.tar.gz", "browser_download_url": "https://github.test/p1/tar", "size": 5}
         ]}
    ]"#;

    const UMU_RELEASES: &str = r#"[
        {"tag_name": "1.1.4", "name": "1.1.4",
         "assets": [
            {"name": "umu-launcher-1.1.4-zipapp.tar", "browser_download_url": "https://github.test/u/tar", "size": 3},
            {"name": "umu-launcher-1.1.4.deb", "browser_download_url": "https://github.test/u/deb", "size": 3}
         ]}
    ]"#;

    async fn github(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repos/GloriousEggroll/proton-ge-custom/releases"))
            .and(header("Accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PROTON_RELEASES))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/Open-Wine-Components/umu-launcher/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_string(UMU_RELEASES))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn refresh_stores_release_list() {
        let server = MockServer::start().await;
        github(&server).await;
        let dir = tempdir().unwrap();
        let mut ctx = linux_context(dir.path(), FakeTransport::new());
        ctx.config.github_api_url = server.uri();

        let releases = refresh_releases(&ctx, &PROTON_GE).await.unwrap();

        assert_eq!(releases.len(), 2);
        assert_eq!(cached_releases(&ctx, &PROTON_GE).unwrap(), releases);
        assert_eq!(
            latest_release(&ctx, &PROTON_GE).unwrap().map(|r| r.tag_name),
            Some("GE-Proton9-2".to_string())
        );
    }

    #[tokio::test]
    async fn refresh_failure_leaves_cache_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempdir().unwrap();
        let mut ctx = linux_context(dir.path(), FakeTransport::new());
        ctx.config.github_api_url = server.uri();

        let err = refresh_releases(&ctx, &PROTON_GE).await.unwrap_err();

        assert!(matches!(err, HangarError::HttpStatus { status: 404, .. }));
        assert!(cached_releases(&ctx, &PROTON_GE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn caches_newest_asset_of_every_source() {
        let server = MockServer::start().await;
        github(&server).await;
        let transport = FakeTransport::new()
            .serve("https://github.test/p2/tar", b"proton")
            .serve("https://github.test/u/tar", b"umu");
        let dir = tempdir().unwrap();
        let mut ctx = linux_context(dir.path(), transport.clone());
        ctx.config.github_api_url = server.uri();

        let cached = cache_releases(&ctx, OperatingSystem::Linux, &ReleaseSelector::new(), false)
            .await
            .unwrap();

        assert_eq!(
            transport.requests(),
            vec!["https://github.test/p2/tar".to_string(), "https://github.test/u/tar".to_string()]
        );
        let proton = ctx
            .paths
            .wine_downloads
            .join("GloriousEggroll/proton-ge-custom/GE-Proton9-2/GE-Proton9-2.tar.gz");
        assert_eq!(cached[0], proton);
        assert_eq!(std::fs::read(&proton).unwrap(), b"proton");
        assert!(cached[1].ends_with("umu-launcher-1.1.4-zipapp.tar"));
    }
}

#[cfg(test)]
mod cleanup_tests {
    use super::*;

    fn populate(ctx: &Context) {
        let releases = newest_first();
        ctx.releases.set_json(&PROTON_GE.to_string(), &releases).unwrap();
        for release in &releases {
            let asset = &release.assets[0];
            let path = asset_path(&ctx.paths, &PROTON_GE, release, asset);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"archive").unwrap();
            let bin = binaries_dir(&ctx.paths, &PROTON_GE, release).join(&release.tag_name);
            std::fs::create_dir_all(&bin).unwrap();
        }
    }

    #[tokio::test]
    async fn removes_everything_but_the_newest_release() {
        let dir = tempdir().unwrap();
        let ctx = linux_context(dir.path(), FakeTransport::new());
        populate(&ctx);
        let releases = newest_first();

        let removed = cleanup_releases(&ctx, OperatingSystem::Linux, 0, true).await.unwrap();

        // two assets, two binaries dirs and the two emptied release download dirs
        assert_eq!(removed, 6);
        let newest = &releases[0];
        assert!(asset_path(&ctx.paths, &PROTON_GE, newest, &newest.assets[0]).is_file());
        assert!(binaries_dir(&ctx.paths, &PROTON_GE, newest).is_dir());
        for old in &releases[1..] {
            assert!(!release_downloads_dir(&ctx.paths, &PROTON_GE, old).exists());
            assert!(!binaries_dir(&ctx.paths, &PROTON_GE, old).exists());
        }

        assert_eq!(cleanup_releases(&ctx, OperatingSystem::Linux, 0, true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_updated_sources_are_cleaned() {
        let dir = tempdir().unwrap();
        let ctx = linux_context(dir.path(), FakeTransport::new());
        populate(&ctx);

        let future = chrono::Utc::now().timestamp() + 3600;
        assert_eq!(cleanup_releases(&ctx, OperatingSystem::Linux, future, false).await.unwrap(), 0);

        let oldest = &newest_first()[2];
        assert!(asset_path(&ctx.paths, &PROTON_GE, oldest, &oldest.assets[0]).is_file());
    }

    #[tokio::test]
    async fn unpack_skips_existing_and_missing_archives() {
        let dir = tempdir().unwrap();
        let ctx = linux_context(dir.path(), FakeTransport::new());
        populate(&ctx);
        ctx.releases
            .set_json(&UMU_LAUNCHER.to_string(), &vec![release("1.1.4", &["umu-zipapp.tar"])])
            .unwrap();

        // proton v3 is already unpacked, the umu archive was never downloaded
        let unpacked = unpack_latest(&ctx, OperatingSystem::Linux, 0, false).await.unwrap();
        assert!(unpacked.is_empty());
    }
}

#[cfg(test)]
mod runtime_tests {
    use super::*;
    use crate::compat::umu;
    use crate::exec::ExecutionTask;
    use crate::store::property;

    #[test]
    fn missing_release_cache_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let ctx = linux_context(dir.path(), FakeTransport::new());

        let err = runtime::proton_path(&ctx).unwrap_err();
        assert!(matches!(err, HangarError::Configuration { .. }));
        assert_eq!(err.suggestion(), Some("Run `hangar cache-releases` first"));
    }

    #[test]
    fn cached_but_not_unpacked_is_an_error() {
        let dir = tempdir().unwrap();
        let ctx = linux_context(dir.path(), FakeTransport::new());
        ctx.releases
            .set_json(&UMU_LAUNCHER.to_string(), &vec![release("1.1.4", &["umu-zipapp.tar"])])
            .unwrap();

        assert!(runtime::umu_run_path(&ctx).is_err());
    }

    #[tokio::test]
    async fn umu_command_writes_config() {
        let dir = tempdir().unwrap();
        let ctx = linux_context(dir.path(), FakeTransport::new());

        let proton = release("GE-Proton9-2", &["GE-Proton9-2.tar.gz"]);
        let umu_release = release("1.1.4", &["umu-zipapp.tar"]);
        ctx.releases.set_json(&PROTON_GE.to_string(), &vec![proton.clone()]).unwrap();
        ctx.releases
            .set_json(&UMU_LAUNCHER.to_string(), &vec![umu_release.clone()])
            .unwrap();
        let proton_dir = binaries_dir(&ctx.paths, &PROTON_GE, &proton).join("GE-Proton9-2");
        std::fs::create_dir_all(&proton_dir).unwrap();
        let umu_run = binaries_dir(&ctx.paths, &UMU_LAUNCHER, &umu_release).join("umu/umu-run");
        std::fs::create_dir_all(umu_run.parent().unwrap()).unwrap();
        std::fs::write(&umu_run, b"#!/bin/sh\n").unwrap();
        ctx.properties
            .replace_values(property::STEAM_APP_ID, "1234", vec!["570".to_string()])
            .unwrap();

        let prefix = dir.path().join("prefix");
        let mut task = ExecutionTask::new(prefix.join("drive_c/Game/game.exe")).args(["-windowed"]);
        task.env = vec!["DXVK_HUD=1".to_string()];

        let spec = umu::command(&ctx, "1234", &prefix, &task).await.unwrap();

        let config_path = umu::config_path(&ctx, "1234");
        assert_eq!(spec.program, umu_run);
        assert_eq!(spec.args, vec!["--config".to_string(), config_path.display().to_string()]);
        assert_eq!(spec.env, vec!["DXVK_HUD=1".to_string()]);

        let written = std::fs::read_to_string(&config_path).unwrap();
        assert!(written.starts_with("[umu]"));
        assert!(written.contains("game_id = \"umu-570\""));
        assert!(written.contains("store = \"gog\""));
        assert!(written.contains("\"-windowed\""));
        assert!(written.contains(&proton_dir.display().to_string()));
    }
}
