use clap::{Parser, Subcommand};
use promoter_core::manifest::grow::GrowFilter;
use promoter_core::manifest::writer::RenderOptions;
use std::path::PathBuf;

mod commands;
mod format;

use format::{ColorChoice, OutputFormat};

/// Promoter — reconciles declared image-promotion manifests against
/// OCI-compatible registries and applies the minimum set of tag moves to
/// converge them.
#[derive(Parser, Debug)]
#[command(name = "promoter")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute and print the promotion plan without executing anything
    Plan {
        /// Path to a fat manifest file or a thin-manifest root directory
        manifest_root: PathBuf,
        /// Emit Delete edges for tags observed at a destination but absent
        /// from the manifest (demotion mode)
        #[arg(long)]
        allow_deletions: bool,
    },
    /// Compute the promotion plan and execute it
    Apply {
        /// Path to a fat manifest file or a thin-manifest root directory
        manifest_root: PathBuf,
        /// Actually dispatch registry calls; without this flag the run is a
        /// dry-run that only logs what would happen
        #[arg(long)]
        confirm: bool,
        /// Emit Delete edges for tags observed at a destination but absent
        /// from the manifest (demotion mode)
        #[arg(long)]
        allow_deletions: bool,
        /// Run report output format
        #[arg(long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },
    /// Parse and validate every manifest at the given path
    Validate {
        /// Path to a fat manifest file or a thin-manifest root directory
        manifest_root: PathBuf,
    },
    /// Rewrite an images.yaml file into canonical form
    Render {
        /// Path to an images.yaml file
        images_file: PathBuf,
        /// Overwrite the file instead of printing to stdout
        #[arg(long)]
        in_place: bool,
        /// Quote digest map keys instead of leaving them bare
        #[arg(long)]
        quote_digest_keys: bool,
        /// Render each digest's tag array across multiple lines
        #[arg(long)]
        split_tag_lines: bool,
    },
    /// Fold a staging registry's inventory into a manifest's images
    Grow {
        /// Path to a fat manifest file or a thin-manifest root directory
        manifest_root: PathBuf,
        /// Staging registry to read from
        #[arg(long)]
        staging: String,
        /// Keep only images whose name matches
        #[arg(long)]
        image_filter: Option<String>,
        /// Keep only tags matching
        #[arg(long)]
        tag_filter: Option<String>,
        /// Keep only digests matching
        #[arg(long)]
        digest_filter: Option<String>,
        /// Overwrite the images file (thin-manifest roots only)
        #[arg(long)]
        in_place: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let color = ColorChoice::from(cli.color.as_str());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        tracing_subscriber::EnvFilter::new(format!("promoter_core={level},promoter_cli={level}"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let exit_code = match cli.command {
        Commands::Plan { manifest_root, allow_deletions } => {
            commands::plan::run(&manifest_root, allow_deletions, color).await
        }
        Commands::Apply {
            manifest_root,
            confirm,
            allow_deletions,
            format,
        } => commands::apply::run(&manifest_root, confirm, allow_deletions, format, color).await,
        Commands::Validate { manifest_root } => commands::validate::run(&manifest_root, color),
        Commands::Render {
            images_file,
            in_place,
            quote_digest_keys,
            split_tag_lines,
        } => {
            let opts = RenderOptions {
                quote_digest_keys,
                split_tag_lines,
            };
            commands::render::run(&images_file, opts, in_place, color)
        }
        Commands::Grow {
            manifest_root,
            staging,
            image_filter,
            tag_filter,
            digest_filter,
            in_place,
        } => {
            let filter = GrowFilter {
                image_filter,
                tag_filter,
                digest_filter,
            };
            commands::grow::run(&manifest_root, &staging, filter, in_place, color).await
        }
    };

    std::process::exit(exit_code);
}
