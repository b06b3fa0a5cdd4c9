use crate::catalog::DatasetManager;
use crate::cli::args::{Cli, Commands, ViewList};
use crate::error::Result;
use crate::loader::Loader;
use crate::mediators::{check_collection_name, mediator_for_gridded, SaveOptions};
use crate::models::{Model, ModelOptions};
use crate::processors::AuditChecker;
use crate::settings::Settings;
use crate::store::{DocumentStore, MemoryStore, MongoStore};
use crate::utils::progress::ProgressReporter;
use crate::writers::CsvWriter;
use std::sync::Arc;
use tracing::warn;

async fn connect(settings: &Settings) -> Result<Arc<dyn DocumentStore>> {
    Ok(Arc::new(MongoStore::connect(&settings.database).await?))
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli.settings)?
        .with_overrides(cli.mongo_uri.clone(), cli.database.clone());

    match cli.command {
        Commands::Load {
            path,
            model,
            name,
            config_file,
            var_name,
            timestamp,
            title,
            overrides,
            align_to,
            force,
            dry_run,
        } => {
            check_collection_name(&name)?;
            println!("Loading {} as {} into \"{}\"", path.display(), model, name);

            let model_options = ModelOptions {
                config_file,
                var_name,
                timestamp,
                title,
                overrides,
            };
            let mut save_options = SaveOptions {
                align_to,
                force,
                batch_size: settings.load.batch_size,
                quiet: cli.quiet,
            };

            let progress = ProgressReporter::new_spinner("Reading source file...", cli.quiet);
            let source = Model::open(&path, model, &model_options)?;
            progress.finish_with_message(&format!(
                "Read {}x{} matrix",
                source.matrix().rows(),
                source.matrix().cols()
            ));

            if dry_run {
                if save_options.align_to.take().is_some() {
                    warn!("--align-to is ignored in a dry run");
                }

                let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
                let metadata = Loader::new(store).save(&source, &name, &save_options).await?;

                println!("{}", serde_json::to_string_pretty(&metadata)?);
                println!("Dry run complete - nothing was written");
                return Ok(());
            }

            let store = connect(&settings).await?;
            Loader::new(store).save(&source, &name, &save_options).await?;

            println!("Upload complete!");
        }

        Commands::Remove { name } => {
            let manager = DatasetManager::new(connect(&settings).await?);
            manager.remove(&name).await?;

            println!("\"{}\" successfully removed", name);
        }

        Commands::Rename { name, new_name } => {
            let manager = DatasetManager::new(connect(&settings).await?);
            manager.rename(&name, &new_name).await?;

            println!("Renamed \"{}\" to \"{}\"", name, new_name);
        }

        Commands::List { include_counts } => {
            let manager = DatasetManager::new(connect(&settings).await?);
            let datasets = manager.list(include_counts).await?;

            if datasets.is_empty() {
                println!("No datasets loaded");
            }
            for dataset in datasets {
                println!("{}", dataset);
            }
        }

        Commands::View {
            list,
            name,
            records,
            coords,
        } => {
            let manager = DatasetManager::new(connect(&settings).await?);

            match (list, name) {
                (Some(ViewList::Metadata), _) | (None, None) => {
                    for id in manager.metadata_ids().await? {
                        println!("{}", id);
                    }
                }
                (Some(ViewList::CoordIndex), _) => {
                    for id in manager.coord_index_ids().await? {
                        println!("{}", id);
                    }
                }
                (Some(ViewList::Collections), _) => {
                    for name in manager.datasets().await? {
                        println!("{}", name);
                    }
                }
                (None, Some(name)) if records => {
                    for id in manager.record_ids(&name).await? {
                        println!("{}", id);
                    }
                }
                (None, Some(name)) if coords => {
                    for [x, y] in manager.coordinates(&name).await? {
                        println!("{}, {}", x, y);
                    }
                }
                (None, Some(name)) => {
                    let metadata = manager.metadata(&name).await?;
                    println!("{}", serde_json::to_string_pretty(&metadata)?);
                }
            }
        }

        Commands::Audit => {
            let checker = AuditChecker::new(connect(&settings).await?);
            let report = checker.audit().await?;

            println!("{}", checker.generate_summary(&report));
        }

        Commands::Export { name, output_file } => {
            let store = connect(&settings).await?;
            let metadata = DatasetManager::new(store.clone()).metadata(&name).await?;
            let dataset = mediator_for_gridded(metadata.gridded, store)
                .load(&name)
                .await?;

            if let Some(parent) = output_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let rows = CsvWriter::new().write_dataset(&dataset, &output_file)?;

            println!("Exported {} rows to {}", rows, output_file.display());
        }
    }

    Ok(())
}
