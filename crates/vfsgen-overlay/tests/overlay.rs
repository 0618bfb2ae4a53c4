#![cfg(unix)]

use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use vfsgen_catalog::{
    CatalogClient, EpisodeInfo, EpisodeType, ExtraType, SeasonInfo, SeriesType, ShowInfo,
    ShowSeason,
};
use vfsgen_config::{CollectionType, LibraryConfig, OverlayConfig};
use vfsgen_events::{Event, EventBus, EventStream};
use vfsgen_overlay::{OverlayError, OverlayService};
use vfsgen_telemetry::Metrics;
use vfsgen_test_support::{DemoLibrary, InMemoryCatalog, read_link, temp_dir, touch};
use walkdir::WalkDir;

fn library(id: &str, collection_type: CollectionType, overlay: &Path, source: &Path) -> LibraryConfig {
    LibraryConfig {
        id: id.to_string(),
        collection_type,
        overlay_root: overlay.to_path_buf(),
        source_roots: vec![source.to_path_buf()],
    }
}

fn service_with(
    libraries: Vec<LibraryConfig>,
    catalog: Arc<dyn CatalogClient>,
) -> Result<(OverlayService, EventBus)> {
    let config = OverlayConfig {
        libraries,
        ..OverlayConfig::default()
    };
    let events = EventBus::new();
    let service = OverlayService::new(&config, catalog, events.clone(), Metrics::new()?);
    Ok((service, events))
}

fn demo_service(demo: &DemoLibrary) -> Result<(OverlayService, EventBus)> {
    let catalog: Arc<dyn CatalogClient> = demo.catalog.clone();
    service_with(
        vec![library(
            "anime",
            CollectionType::Shows,
            &demo.overlay_root,
            &demo.source_root,
        )],
        catalog,
    )
}

fn episode_link(demo: &DemoLibrary, name: &str) -> PathBuf {
    demo.season_dir().join(name)
}

fn symlinks_under(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path_is_symlink())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn drain(stream: &mut EventStream) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(envelope) = stream.try_next() {
        events.push(envelope.event);
    }
    events
}

#[tokio::test]
async fn library_pass_builds_the_expected_layout() -> Result<()> {
    let demo = DemoLibrary::new()?;
    let episode = demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    let recap = demo.add_episode_file("recap.mkv", "12", &["29"])?;
    let trailer = demo.add_episode_file("pv.mkv", "13", &["30"])?;
    let (service, _) = demo_service(&demo)?;

    assert!(service.ensure_generated(&demo.overlay_root).await?);

    assert_eq!(
        read_link(&episode_link(&demo, "Demo S01E01 [sid=200] [fid=10].mkv")),
        Some(episode)
    );
    assert_eq!(
        read_link(
            &demo
                .show_dir()
                .join("Season 00")
                .join("Demo S00E01 [sid=200] [fid=12].mkv")
        ),
        Some(recap)
    );
    assert_eq!(
        read_link(&demo.show_dir().join("trailers").join("PV [sid=200] [fid=13].mkv")),
        Some(trailer)
    );
    assert!(!demo.overlay_root.join(".vfsgen-probe").exists());
    Ok(())
}

#[tokio::test]
async fn regeneration_of_an_unchanged_catalog_is_a_noop() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    demo.add_episode_file("ep02.mkv", "11", &["21"])?;
    touch(&demo.source_root.join("Show/ep01.en.srt"), "subtitle")?;
    let (service, _) = demo_service(&demo)?;

    assert!(service.ensure_generated(&demo.overlay_root).await?);
    let again = service.generate(&demo.overlay_root).await?;

    assert_eq!(again.created(), 0);
    assert_eq!(again.fixed(), 0);
    assert_eq!(again.removed(), 0);
    assert_eq!(again.skipped(), again.total());
    assert_eq!(again.total(), 3);
    assert_eq!(again.subtitles.skipped, 1);
    assert!(again.is_noop());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_pass() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    demo.catalog.set_delay(Some(Duration::from_millis(100)));
    let (service, _) = demo_service(&demo)?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let season = demo.season_dir();
        handles.push(tokio::spawn(async move {
            service.ensure_generated(&season).await
        }));
    }
    for handle in handles {
        assert!(handle.await??);
    }
    assert_eq!(demo.catalog.scope_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn every_placed_link_decodes_to_its_origin() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    demo.add_episode_file("ep02.mkv", "11", &["21"])?;
    demo.add_episode_file("pv.mkv", "13", &["30"])?;
    let (service, _) = demo_service(&demo)?;
    assert!(service.ensure_generated(&demo.source_root).await?);

    let links = symlinks_under(&demo.overlay_root);
    assert!(links.len() >= 3);
    for link in links {
        let (series_id, file_id) = OverlayService::decode_identity(&link)
            .ok_or_else(|| anyhow!("no identity in {}", link.display()))?;
        assert_eq!(series_id, DemoLibrary::SERIES_ID);
        let registered = service
            .lookup(&link)
            .ok_or_else(|| anyhow!("{} was not registered", link.display()))?;
        assert_eq!(registered.series_id, series_id);
        assert_eq!(registered.file_id, file_id);
        assert!(!registered.episode_ids.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn sweep_removes_exactly_the_orphans() -> Result<()> {
    let demo = DemoLibrary::new()?;
    let source = demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    demo.add_episode_file("ep02.mkv", "11", &["21"])?;
    let (service, _) = demo_service(&demo)?;
    assert!(service.ensure_generated(&demo.overlay_root).await?);

    let orphans = [
        episode_link(&demo, "Demo S01E07 [sid=200] [fid=97].mkv"),
        episode_link(&demo, "Demo S01E08 [sid=200] [fid=98].mkv"),
        demo.show_dir().join("Season 02").join("Demo S02E01 [sid=200] [fid=99].mkv"),
    ];
    for orphan in &orphans {
        if let Some(parent) = orphan.parent() {
            std::fs::create_dir_all(parent)?;
        }
        symlink(&source, orphan)?;
    }

    let result = service.generate(&demo.overlay_root).await?;
    assert_eq!(result.removed(), 3);
    assert_eq!(result.skipped(), 2);
    assert_eq!(symlinks_under(&demo.overlay_root).len(), 2);
    assert!(!demo.show_dir().join("Season 02").exists());
    for orphan in &orphans {
        assert!(service.lookup(orphan).is_none());
    }
    Ok(())
}

#[tokio::test]
async fn catalog_deletions_remove_links_and_empty_folders() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    demo.add_episode_file("ep02.mkv", "11", &["21"])?;
    let (service, _) = demo_service(&demo)?;
    assert!(service.ensure_generated(&demo.season_dir()).await?);

    let first = episode_link(&demo, "Demo S01E01 [sid=200] [fid=10].mkv");
    let second = episode_link(&demo, "Demo S01E02 [sid=200] [fid=11].mkv");
    assert!(read_link(&second).is_some());

    demo.catalog.remove_file("11");
    assert_eq!(service.invalidate(&demo.season_dir()).await, 1);
    assert!(service.ensure_generated(&demo.season_dir()).await?);
    assert!(read_link(&second).is_none());
    assert!(read_link(&first).is_some());

    demo.catalog.remove_file("10");
    service.invalidate(&demo.season_dir()).await;
    assert!(service.ensure_generated(&demo.season_dir()).await?);
    assert!(!demo.season_dir().exists());
    assert!(demo.overlay_root.exists());
    Ok(())
}

#[tokio::test]
async fn subtitle_sidecars_follow_their_video() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    let subtitle = demo.source_root.join("Show/ep01.en.srt");
    touch(&subtitle, "1\n00:00:01,000 --> 00:00:02,000\nhello\n")?;
    let (service, _) = demo_service(&demo)?;

    let created = service.generate(&demo.season_dir()).await?;
    assert_eq!(created.videos.created, 1);
    assert_eq!(created.subtitles.created, 1);
    let link = episode_link(&demo, "Demo S01E01 [sid=200] [fid=10].en.srt");
    assert_eq!(read_link(&link), Some(subtitle.clone()));

    std::fs::remove_file(&subtitle)?;
    let swept = service.generate(&demo.season_dir()).await?;
    assert_eq!(swept.subtitles.removed, 1);
    assert_eq!(swept.videos.skipped, 1);
    assert!(std::fs::symlink_metadata(&link).is_err());
    Ok(())
}

#[tokio::test]
async fn failed_passes_are_not_cached_and_degrade_health() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    let (service, events) = demo_service(&demo)?;
    let mut stream = events.subscribe(None);

    demo.catalog.set_failing(true);
    let err = service
        .ensure_generated(&demo.overlay_root)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected the pass to fail"))?;
    assert!(matches!(
        err.root_cause(),
        OverlayError::Catalog { library_id, .. } if library_id == "anime"
    ));
    assert!(!err.is_fatal());
    assert!(service.is_degraded());

    let failed = drain(&mut stream);
    assert!(matches!(failed.first(), Some(Event::GenerationStarted { .. })));
    assert!(failed.iter().any(|event| matches!(
        event,
        Event::GenerationFailed { message, .. } if message.contains("injected catalog failure")
    )));
    assert!(failed.contains(&Event::HealthChanged {
        degraded: vec!["overlay".to_string()]
    }));

    demo.catalog.set_failing(false);
    assert!(service.ensure_generated(&demo.overlay_root).await?);
    assert_eq!(demo.catalog.scope_calls(), 2);
    assert!(!service.is_degraded());

    let recovered = drain(&mut stream);
    assert!(recovered.contains(&Event::HealthChanged { degraded: vec![] }));
    assert!(recovered.iter().any(|event| matches!(
        event,
        Event::GenerationCompleted { created: 1, removed: 0, .. }
    )));
    Ok(())
}

#[tokio::test]
async fn refused_symlinks_fail_the_pass_without_caching_it() -> Result<()> {
    static LINK_ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    fn refuse_first_link(target: &Path, link: &Path) -> io::Result<()> {
        if LINK_ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        symlink(target, link)
    }

    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    let (service, _) = demo_service(&demo)?;
    let service = service.with_link_probe(refuse_first_link);

    let err = service
        .ensure_generated(&demo.season_dir())
        .await
        .err()
        .ok_or_else(|| anyhow!("expected symbolic links to be refused"))?;
    assert!(matches!(
        err.root_cause(),
        OverlayError::SymlinkUnsupported { path, .. } if path.ends_with(".vfsgen-probe")
    ));
    assert!(err.is_fatal());
    assert!(service.is_degraded());
    assert_eq!(demo.catalog.scope_calls(), 0);
    assert!(symlinks_under(&demo.overlay_root).is_empty());

    assert!(service.ensure_generated(&demo.season_dir()).await?);
    assert_eq!(LINK_ATTEMPTS.load(Ordering::SeqCst), 2);
    assert_eq!(demo.catalog.scope_calls(), 1);
    assert!(!service.is_degraded());
    let link = episode_link(&demo, "Demo S01E01 [sid=200] [fid=10].mkv");
    assert!(read_link(&link).is_some());

    assert!(service.ensure_generated(&link).await?);
    assert_eq!(LINK_ATTEMPTS.load(Ordering::SeqCst), 2);
    assert_eq!(demo.catalog.scope_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn removing_a_library_deletes_its_overlay() -> Result<()> {
    let demo = DemoLibrary::new()?;
    demo.add_episode_file("ep01.mkv", "10", &["20"])?;
    let (service, events) = demo_service(&demo)?;
    let mut stream = events.subscribe(None);
    assert!(service.ensure_generated(&demo.overlay_root).await?);
    let link = episode_link(&demo, "Demo S01E01 [sid=200] [fid=10].mkv");
    assert!(service.lookup(&link).is_some());

    assert!(service.remove_library("anime").await?);
    assert!(!demo.overlay_root.exists());
    assert!(service.lookup(&link).is_none());
    assert!(service.libraries().is_empty());
    assert!(!service.ensure_generated(&demo.show_dir()).await?);
    assert!(!service.remove_library("anime").await?);
    assert!(drain(&mut stream).contains(&Event::LibraryRemoved {
        library_id: "anime".to_string()
    }));
    Ok(())
}

#[tokio::test]
async fn movie_scope_keeps_its_extras() -> Result<()> {
    let dir = temp_dir()?;
    let source_root = dir.path().join("src");
    let overlay_root = dir.path().join("vfs");
    let movie = source_root.join("film.mkv");
    let making_of = source_root.join("making-of.mkv");
    touch(&movie, "movie")?;
    touch(&making_of, "extra")?;

    let catalog = InMemoryCatalog::new();
    catalog.add_show(ShowInfo {
        id: "7".to_string(),
        name: "Film".to_string(),
        seasons: vec![ShowSeason {
            series_id: "7".to_string(),
            season_number: 1,
        }],
        episode_padding: 2,
    });
    catalog.add_season(SeasonInfo {
        id: "7".to_string(),
        title: "Film".to_string(),
        series_type: SeriesType::Movie,
        episodes: vec![
            EpisodeInfo {
                id: "70".to_string(),
                episode_type: EpisodeType::Normal,
                number: 1,
                title: Some("Complete Movie".to_string()),
                extra_type: None,
            },
            EpisodeInfo {
                id: "71".to_string(),
                episode_type: EpisodeType::Special,
                number: 1,
                title: Some("Making Of".to_string()),
                extra_type: Some(ExtraType::BehindTheScenes),
            },
        ],
    });
    catalog.add_file(&movie, "9", "7", &["70"]);
    catalog.add_file(&making_of, "8", "7", &["71"]);

    let catalog: Arc<dyn CatalogClient> = Arc::new(catalog);
    let (service, _) = service_with(
        vec![library("films", CollectionType::Movies, &overlay_root, &source_root)],
        catalog,
    )?;

    let folder = overlay_root.join("Film [sid=7] [eid=70]");
    let first = service.generate(&folder).await?;
    assert_eq!(first.videos.created, 2);
    let again = service.generate(&folder).await?;
    assert_eq!(again.removed(), 0);
    assert_eq!(again.videos.skipped, 2);
    assert_eq!(read_link(&folder.join("Movie [sid=7] [fid=9].mkv")), Some(movie));
    assert_eq!(
        read_link(
            &folder
                .join("behind the scenes")
                .join("Making Of [sid=7] [fid=8].mkv")
        ),
        Some(making_of)
    );
    Ok(())
}
