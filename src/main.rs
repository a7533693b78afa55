use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use git_tfs_bridge::{
    ChangesetId, Config, Git, IgnoreRules, JoinedTimeline, Mode, Replay, SubRepository, Tf,
};

#[derive(Parser)]
#[command(name = "git-tfs-bridge")]
#[command(about = "Replay TFS changesets into a git repository, one commit per changeset")]
#[command(version)]
struct Cli {
    /// Folder whose subfolders are TFS working copies
    #[arg(long, global = true, default_value = ".")]
    source: PathBuf,

    /// Git working tree that receives one subfolder per TFS working copy
    #[arg(long, global = true, default_value = ".")]
    target: PathBuf,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import CHANGESET in full as the first commit, then every later changeset
    Init {
        changeset: ChangesetId,
    },

    /// Import every changeset newer than CHANGESET
    Import {
        changeset: ChangesetId,
    },

    /// Print the joined history newer than CHANGESET without changing anything
    Log {
        changeset: ChangesetId,

        /// Include CHANGESET itself
        #[arg(long)]
        inclusive: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
        }
        Command::Init { changeset } => {
            run(&cli.source, &cli.target, &config, Mode::Initial(changeset))?;
        }
        Command::Import { changeset } => {
            run(&cli.source, &cli.target, &config, Mode::Incremental(changeset))?;
        }
        Command::Log {
            changeset,
            inclusive,
        } => {
            let mode = if inclusive {
                Mode::Initial(changeset)
            } else {
                Mode::Incremental(changeset)
            };
            log(&cli.source, &cli.target, &config, mode)?;
        }
    }

    Ok(())
}

fn run(source_root: &Path, target_root: &Path, config: &Config, mode: Mode) -> anyhow::Result<()> {
    let tf = tf_client(config)?;
    let git = Git::open(&config.git_command, target_root)
        .with_context(|| format!("opening git repository at {}", target_root.display()))?;
    let ignore = IgnoreRules::from_file(&config.ignore_file_for(target_root))?;
    let repositories = discover(&tf, source_root, config)?;

    let mut replay = Replay::new(&tf, &git, repositories, &ignore, config);
    let summary = replay.run(mode)?;
    println!(
        "Imported {} commits ({} files written, {} removed, {} failed).",
        summary.commits, summary.files_written, summary.files_removed, summary.files_failed
    );
    Ok(())
}

/// Print the timeline. Only queries the source; the target need not be a git repository.
fn log(source_root: &Path, target_root: &Path, config: &Config, mode: Mode) -> anyhow::Result<()> {
    let tf = tf_client(config)?;
    let ignore = IgnoreRules::from_file(&config.ignore_file_for(target_root))?;
    let repositories: Vec<Arc<SubRepository>> = discover(&tf, source_root, config)?
        .into_iter()
        .map(Arc::new)
        .collect();

    let timeline = JoinedTimeline::build(
        &tf,
        &repositories,
        &ignore,
        mode.boundary(),
        config.history.page_size,
    );
    for (changeset, records) in timeline.iter() {
        tracing::debug!("C{changeset}: {} records", records.len());
        for record in records {
            print!("{record}");
        }
    }
    Ok(())
}

fn tf_client(config: &Config) -> anyhow::Result<Tf> {
    Ok(Tf::new(config.tf_command.as_str()).with_encoding(config.tf_encoding()?))
}

fn discover(tf: &Tf, source_root: &Path, config: &Config) -> anyhow::Result<Vec<SubRepository>> {
    let repositories = SubRepository::discover(tf, source_root, &config.history.exclude)
        .with_context(|| format!("scanning {}", source_root.display()))?;
    if repositories.is_empty() {
        anyhow::bail!("no TFS working copies found under {}", source_root.display());
    }
    tracing::info!("found {} TFS working copies", repositories.len());
    Ok(repositories)
}
