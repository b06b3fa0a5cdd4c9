use crate::models::ModelKind;
use crate::utils::constants::DEFAULT_SETTINGS_FILE;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flux-etl")]
#[command(about = "Loads carbon-flux grids and retrievals into MongoDB for the flux visualization client")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide progress bars")]
    pub quiet: bool,

    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE, help = "Settings file (TOML)")]
    pub settings: PathBuf,

    #[arg(long, global = true, help = "MongoDB connection string")]
    pub mongo_uri: Option<String>,

    #[arg(long, global = true, help = "Database name")]
    pub database: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a Matlab or HDF5 file into a collection
    Load {
        #[arg(short, long, help = "Input file in Matlab (*.mat) or HDF5 (*.h5 or *.mat) format")]
        path: PathBuf,

        #[arg(short, long, help = "Model associated with the input dataset")]
        model: ModelKind,

        #[arg(short = 'n', long = "collection-name", help = "Collection name for the dataset")]
        name: String,

        #[arg(
            short,
            long,
            help = "JSON config file [default: input file with a .json extension]"
        )]
        config_file: Option<PathBuf>,

        #[arg(short, long, help = "Name of the variable holding the data")]
        var_name: Option<String>,

        #[arg(short, long, help = "ISO 8601 timestamp of the first observation")]
        timestamp: Option<String>,

        #[arg(short = 'T', long, help = "Display title")]
        title: Option<String>,

        #[arg(short = 'o', long, help = "Config overrides, e.g. \"precision=3;title=CASA\"")]
        overrides: Option<String>,

        #[arg(long, help = "Reorder cells onto the grid of an existing dataset")]
        align_to: Option<String>,

        #[arg(long, help = "Remove an existing dataset of the same name first")]
        force: bool,

        #[arg(long, help = "Load into memory and print the metadata without touching the database")]
        dry_run: bool,
    },

    /// Remove a dataset with its metadata and coordinate index
    Remove {
        #[arg(short = 'n', long = "collection-name")]
        name: String,
    },

    /// Rename a dataset with its metadata and coordinate index
    Rename {
        #[arg(short = 'n', long = "collection-name")]
        name: String,

        #[arg(short = 'r', long = "new-name")]
        new_name: String,
    },

    /// List datasets
    List {
        #[arg(short = 'z', long, help = "Show record counts")]
        include_counts: bool,
    },

    /// Show metadata, coordinate indexes or records
    View {
        #[arg(short, long, value_enum, help = "List the ids of a catalog collection")]
        list: Option<ViewList>,

        #[arg(short = 'n', long = "collection-name")]
        name: Option<String>,

        #[arg(long, requires = "name", help = "List the record ids of the dataset")]
        records: bool,

        #[arg(long, requires = "name", help = "List the grid cell coordinates of the dataset")]
        coords: bool,
    },

    /// Check that every dataset has its metadata and coordinate index
    Audit,

    /// Export a stored dataset to CSV
    Export {
        #[arg(short = 'n', long = "collection-name")]
        name: String,

        #[arg(short, long, help = "Output CSV file")]
        output_file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewList {
    Metadata,
    CoordIndex,
    Collections,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load() {
        let cli = Cli::try_parse_from([
            "flux-etl",
            "load",
            "-p",
            "casagfed2004.mat",
            "-m",
            "SpatioTemporalMatrix",
            "-n",
            "casa_gfed_2004",
            "-t",
            "2003-12-22T03:00:00",
            "-o",
            "precision=3",
        ])
        .unwrap();

        match cli.command {
            Commands::Load {
                model,
                name,
                timestamp,
                overrides,
                force,
                ..
            } => {
                assert_eq!(model, ModelKind::SpatioTemporalMatrix);
                assert_eq!(name, "casa_gfed_2004");
                assert_eq!(timestamp.as_deref(), Some("2003-12-22T03:00:00"));
                assert_eq!(overrides.as_deref(), Some("precision=3"));
                assert!(!force);
            }
            _ => panic!("expected load"),
        }
        assert_eq!(cli.settings, PathBuf::from("flux-etl.toml"));
    }

    #[test]
    fn test_parse_rename_and_globals() {
        let cli = Cli::try_parse_from([
            "flux-etl",
            "rename",
            "-n",
            "old",
            "-r",
            "new",
            "--database",
            "fluxvis_test",
            "--quiet",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Rename { ref name, ref new_name } if name == "old" && new_name == "new"));
        assert_eq!(cli.database.as_deref(), Some("fluxvis_test"));
        assert!(cli.quiet);
    }

    #[test]
    fn test_view_records_requires_name() {
        assert!(Cli::try_parse_from(["flux-etl", "view", "--records"]).is_err());
        assert!(Cli::try_parse_from(["flux-etl", "view", "-l", "coord-index"]).is_ok());
    }
}
