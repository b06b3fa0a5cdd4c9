mod common;

use common::{approx, write_mat, FlakyStore};
use flux_etl::catalog::DatasetManager;
use flux_etl::error::{ProcessingError, Result};
use flux_etl::loader::Loader;
use flux_etl::mediators::{mediator_for_gridded, SaveOptions};
use flux_etl::models::{Dataset, ModelKind, ModelOptions};
use flux_etl::processors::{AuditChecker, BoundingBox, FindingType};
use flux_etl::store::{DocumentStore, MemoryStore};
use flux_etl::writers::CsvWriter;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn casa_fixture(dir: &TempDir) -> PathBuf {
    write_mat(
        &dir.path().join("casa_test.mat"),
        &[(
            "casa",
            vec![
                vec![-166.5, 10.5, 1.0, 4.0],
                vec![-165.5, 10.5, 2.0, 5.0],
                vec![-166.5, 11.5, 3.0, 6.0],
            ],
        )],
    )
}

fn casa_options() -> ModelOptions {
    ModelOptions {
        timestamp: Some("2004-06-30T00:00:00".to_string()),
        ..Default::default()
    }
}

fn setup() -> (Arc<MemoryStore>, Loader) {
    let store = Arc::new(MemoryStore::new());
    let loader = Loader::new(store.clone());
    (store, loader)
}

#[tokio::test]
async fn test_load_time_steps_end_to_end() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (store, loader) = setup();

    let metadata = loader
        .load(
            &path,
            ModelKind::SpatioTemporalMatrix,
            "casa_gfed_2004",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await?;

    assert_eq!(metadata.id, "casa_gfed_2004");
    assert_eq!(metadata.var_name, "casa");
    assert_eq!(
        metadata.dates,
        vec!["2004-06-30T00:00:00".to_string(), "2004-06-30T03:00:00".to_string()]
    );
    assert_eq!(metadata.bbox, Some(BoundingBox::new(-166.5, 10.5, -165.5, 11.5)));
    assert!(metadata.gridded);

    let stats = &metadata.stats["values"];
    assert!(approx(stats.mean, 3.5));
    assert!(approx(stats.min, 1.0));
    assert!(approx(stats.max, 6.0));
    assert!(approx(stats.median, 3.5));
    assert!(approx(stats.std.unwrap(), 3.5f64.sqrt()));

    assert_eq!(store.count("casa_gfed_2004").await?, 2);

    let manager = DatasetManager::new(store.clone());
    assert_eq!(
        manager.coordinates("casa_gfed_2004").await?,
        vec![[-166.5, 10.5], [-165.5, 10.5], [-166.5, 11.5]]
    );
    assert_eq!(manager.metadata("casa_gfed_2004").await?, metadata);

    Ok(())
}

#[tokio::test]
async fn test_sidecar_config_is_applied() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    fs::write(
        dir.path().join("casa_test.json"),
        r#"{"timestamp": "2004-06-30T00:00:00", "steps": [3600], "title": "CASA GFED"}"#,
    )?;
    let (_store, loader) = setup();

    let metadata = loader
        .load(
            &path,
            ModelKind::SpatioTemporalMatrix,
            "casa_hourly",
            &ModelOptions::default(),
            &SaveOptions::default(),
        )
        .await?;

    assert_eq!(metadata.title, "CASA GFED");
    assert_eq!(metadata.steps, Some(vec![3600]));
    assert_eq!(metadata.dates[1], "2004-06-30T01:00:00");

    Ok(())
}

#[tokio::test]
async fn test_load_kriged_from_filename_timestamp() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_mat(
        &dir.path().join("Kriged_20090615_test.mat"),
        &[(
            "krigedData",
            vec![
                vec![10.5, -166.5, 386.79, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![69.5, -50.5, 388.0, 0.25, 0.0, 0.0, 0.0, 0.0, 0.0],
            ],
        )],
    );
    let (store, loader) = setup();

    let metadata = loader
        .load(
            &path,
            ModelKind::KrigedXco2Matrix,
            "xco2_kriged",
            &ModelOptions::default(),
            &SaveOptions::default(),
        )
        .await?;

    assert_eq!(metadata.dates, vec!["2009-06-15T00:00:00".to_string()]);
    assert_eq!(metadata.spans, Some(vec![518400]));
    assert_eq!(metadata.bboxmd5.as_deref(), Some("6f3e33c145010bc74c5ccd3ba772f504"));
    assert!(approx(metadata.stats["values"].mean, 387.4));
    assert!(approx(metadata.stats["errors"].max, 2.0));
    assert!(approx(metadata.stats["errors"].min, 0.5));
    assert_eq!(store.count("xco2_kriged").await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_load_features() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_mat(
        &dir.path().join("XCO2_20090615_points.mat"),
        &[(
            "XCO2",
            vec![
                vec![-120.5, 35.5, 386.5, 166.0, 2009.0, 0.25],
                vec![-119.0, 36.0, 388.5, 167.0, 2009.0, 0.75],
            ],
        )],
    );
    let (store, loader) = setup();

    let metadata = loader
        .load(
            &path,
            ModelKind::Xco2Matrix,
            "xco2_points",
            &ModelOptions::default(),
            &SaveOptions::default(),
        )
        .await?;

    assert!(!metadata.gridded);
    assert!(approx(metadata.stats["value"].mean, 387.5));
    assert!(approx(metadata.stats["error"].median, 0.5));

    let manager = DatasetManager::new(store.clone());
    assert!(manager.coord_index_ids().await?.is_empty());

    let report = AuditChecker::new(store.clone()).audit().await?;
    assert!(report.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_reload_merges_and_rejects_duplicates() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (_store, loader) = setup();
    let save = SaveOptions::default();

    loader
        .load(&path, ModelKind::SpatioTemporalMatrix, "casa", &casa_options(), &save)
        .await?;

    let duplicate = loader
        .load(&path, ModelKind::SpatioTemporalMatrix, "casa", &casa_options(), &save)
        .await;
    assert!(matches!(duplicate, Err(ProcessingError::DuplicateRecord { .. })));

    let later = ModelOptions {
        timestamp: Some("2004-06-30T06:00:00".to_string()),
        ..Default::default()
    };
    let merged = loader
        .load(&path, ModelKind::SpatioTemporalMatrix, "casa", &later, &save)
        .await?;
    assert_eq!(
        merged.dates,
        vec!["2004-06-30T00:00:00".to_string(), "2004-06-30T09:00:00".to_string()]
    );

    Ok(())
}

#[tokio::test]
async fn test_force_replaces_existing_dataset() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (store, loader) = setup();

    loader
        .load(
            &path,
            ModelKind::SpatioTemporalMatrix,
            "casa",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await?;

    let forced = SaveOptions {
        force: true,
        ..Default::default()
    };
    loader
        .load(&path, ModelKind::SpatioTemporalMatrix, "casa", &casa_options(), &forced)
        .await?;

    assert_eq!(store.count("casa").await?, 2);
    assert!(AuditChecker::new(store.clone()).audit().await?.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_rename_moves_all_artifacts() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (store, loader) = setup();

    loader
        .load(
            &path,
            ModelKind::SpatioTemporalMatrix,
            "casa",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await?;

    let manager = DatasetManager::new(store.clone());
    manager.rename("casa", "casa_gfed_2004").await?;

    assert_eq!(manager.datasets().await?, vec!["casa_gfed_2004".to_string()]);
    assert_eq!(manager.metadata_ids().await?, vec!["casa_gfed_2004".to_string()]);
    assert_eq!(manager.coord_index_ids().await?, vec!["casa_gfed_2004".to_string()]);
    assert_eq!(manager.metadata("casa_gfed_2004").await?.id, "casa_gfed_2004");

    let report = AuditChecker::new(store.clone()).audit().await?;
    assert!(report.is_consistent());

    assert!(matches!(
        manager.rename("casa", "other").await,
        Err(ProcessingError::DatasetNotFound { .. })
    ));

    Ok(())
}

/// Load the casa fixture as "casa" through a store with injected failures.
async fn flaky_manager(dir: &TempDir, store: FlakyStore) -> Result<DatasetManager> {
    let store = Arc::new(store);
    Loader::new(store.clone())
        .load(
            &casa_fixture(dir),
            ModelKind::SpatioTemporalMatrix,
            "casa",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await?;
    Ok(DatasetManager::new(store))
}

async fn assert_only_casa(manager: &DatasetManager) -> Result<()> {
    let casa = vec!["casa".to_string()];
    assert_eq!(manager.datasets().await?, casa);
    assert_eq!(manager.metadata_ids().await?, casa);
    assert_eq!(manager.coord_index_ids().await?, casa);
    assert!(!manager.exists("casa2").await?);
    Ok(())
}

#[tokio::test]
async fn test_failed_rename_rolls_back() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FlakyStore::new(MemoryStore::new()).fail_delete("metadata", "casa");
    let manager = flaky_manager(&dir, store).await?;

    let renamed = manager.rename("casa", "casa2").await;
    assert!(matches!(renamed, Err(ProcessingError::Io(_))));
    assert_only_casa(&manager).await?;
    assert_eq!(manager.metadata("casa").await?.id, "casa");

    Ok(())
}

#[tokio::test]
async fn test_failed_data_rename_leaves_dataset_untouched() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FlakyStore::new(MemoryStore::new()).fail_rename_from("casa");
    let manager = flaky_manager(&dir, store).await?;

    assert!(manager.rename("casa", "casa2").await.is_err());
    assert_only_casa(&manager).await?;

    Ok(())
}

#[tokio::test]
async fn test_failed_rollback_reports_partial_rename() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FlakyStore::new(MemoryStore::new())
        .fail_delete("metadata", "casa")
        .fail_rename_from("casa2");
    let manager = flaky_manager(&dir, store).await?;

    match manager.rename("casa", "casa2").await {
        Err(ProcessingError::PartialOperation { completed, .. }) => {
            assert_eq!(completed, vec!["renamed data collection".to_string()]);
        }
        other => panic!("expected a partial rename, got {:?}", other),
    }
    assert_eq!(manager.datasets().await?, vec!["casa2".to_string()]);
    assert_eq!(manager.metadata_ids().await?, vec!["casa".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_failed_copy_cleanup_reports_partial_move() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FlakyStore::new(MemoryStore::new())
        .fail_delete("metadata", "casa")
        .fail_delete("metadata", "casa2");
    let manager = flaky_manager(&dir, store).await?;

    match manager.rename("casa", "casa2").await {
        Err(ProcessingError::PartialOperation { completed, .. }) => {
            assert_eq!(completed, vec!["copied metadata entry to \"casa2\"".to_string()]);
        }
        other => panic!("expected a partial move, got {:?}", other),
    }
    // The data collection was moved back before reporting
    assert_eq!(manager.datasets().await?, vec!["casa".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_failed_remove_reports_partial_remove() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FlakyStore::new(MemoryStore::new()).fail_delete("metadata", "casa");
    let manager = flaky_manager(&dir, store).await?;

    match manager.remove("casa").await {
        Err(ProcessingError::PartialOperation { completed, .. }) => {
            assert_eq!(completed, vec!["removed data collection".to_string()]);
        }
        other => panic!("expected a partial remove, got {:?}", other),
    }
    assert!(manager.datasets().await?.is_empty());
    assert_eq!(manager.metadata_ids().await?, vec!["casa".to_string()]);
    assert_eq!(manager.coord_index_ids().await?, vec!["casa".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_remove_and_audit() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (store, loader) = setup();

    for name in ["casa", "casa_copy"] {
        loader
            .load(
                &path,
                ModelKind::SpatioTemporalMatrix,
                name,
                &casa_options(),
                &SaveOptions::default(),
            )
            .await?;
    }

    let manager = DatasetManager::new(store.clone());
    manager.remove("casa").await?;
    assert!(!manager.exists("casa").await?);
    assert!(manager.exists("casa_copy").await?);

    // Drop only the data, leaving metadata and coordinate index behind
    store.drop_collection("casa_copy").await?;

    let checker = AuditChecker::new(store.clone());
    let report = checker.audit().await?;
    assert_eq!(report.findings_of(FindingType::OrphanedMetadata).len(), 1);
    assert_eq!(report.findings_of(FindingType::OrphanedCoordIndex).len(), 1);
    assert!(checker.generate_summary(&report).contains("casa_copy"));

    Ok(())
}

#[tokio::test]
async fn test_reserved_and_unknown_inputs() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (_store, loader) = setup();

    let reserved = loader
        .load(
            &path,
            ModelKind::SpatioTemporalMatrix,
            "metadata",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await;
    assert!(matches!(reserved, Err(ProcessingError::ReservedName(_))));

    let text = dir.path().join("notes.txt");
    fs::write(&text, "not a matrix")?;
    let unsupported = loader
        .load(
            &text,
            ModelKind::SpatioTemporalMatrix,
            "notes",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await;
    assert!(matches!(unsupported, Err(ProcessingError::UnsupportedFormat(_))));

    Ok(())
}

#[tokio::test]
async fn test_export_to_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let path = casa_fixture(&dir);
    let (store, loader) = setup();

    loader
        .load(
            &path,
            ModelKind::SpatioTemporalMatrix,
            "casa",
            &casa_options(),
            &SaveOptions::default(),
        )
        .await?;

    let dataset = mediator_for_gridded(true, store.clone()).load("casa").await?;
    assert!(matches!(dataset, Dataset::Gridded(_)));

    let output = dir.path().join("export").join("casa.csv");
    fs::create_dir_all(output.parent().unwrap())?;
    let rows = CsvWriter::new().write_dataset(&dataset, &output)?;
    assert_eq!(rows, 3);

    let content = fs::read_to_string(&output)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "x,y,2004-06-30T00:00:00,2004-06-30T03:00:00");
    assert_eq!(lines[1], "-166.5,10.5,1,4");

    Ok(())
}
