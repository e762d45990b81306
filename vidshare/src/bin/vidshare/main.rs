mod output;
mod theme;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{
    Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, Style},
    },
};
use colored::Color as ThemeColor;
use vidshare::{Client, Config, CoreError, EntityId, LocalBlobStore, RedisStore};

use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::THEME;

#[derive(Parser)]
#[command(name = "vidshare")]
#[command(version)]
#[command(about = "Operator tools for the vidshare data-access core")]
#[command(subcommand_required = true, arg_required_else_help = true)]
#[command(styles = help_styles())]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "VIDSHARE_CONFIG")]
    config: Option<PathBuf>,

    /// Redis connection URL (overrides the configuration file)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the store is reachable
    Ping,

    /// Show channel statistics
    Stats {
        /// Channel (user) id
        channel: String,
    },

    /// Delete a video and clean up its dependents; safe to re-run
    DeleteVideo {
        /// Video id
        video: String,

        /// Id of the owner performing the delete
        #[arg(long)]
        actor: String,
    },

    /// Clean up comments, likes and playlist entries left by a failed video delete
    RepairVideo {
        /// Id of the deleted video
        video: String,
    },

    /// Delete every key under the configured prefix
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(style_from_color(theme.primary).bold())
        .header(style_from_color(theme.highlight).bold())
        .literal(style_from_color(theme.key))
        .placeholder(style_from_color(theme.muted))
        .valid(style_from_color(theme.success))
        .invalid(style_from_color(theme.warning))
        .error(style_from_color(theme.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    let ansi = match color {
        ThemeColor::Red => AnsiColor::Red,
        ThemeColor::Green => AnsiColor::Green,
        ThemeColor::Yellow => AnsiColor::Yellow,
        ThemeColor::Blue => AnsiColor::Blue,
        ThemeColor::Cyan => AnsiColor::Cyan,
        ThemeColor::BrightBlack => AnsiColor::BrightBlack,
        ThemeColor::BrightBlue => AnsiColor::BrightBlue,
        ThemeColor::BrightCyan => AnsiColor::BrightCyan,
        _ => AnsiColor::White,
    };
    Style::new().fg_color(Some(ClapColor::Ansi(ansi)))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        no_color: cli.no_color,
    });
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = execute(cli, &output).await {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn execute(cli: Cli, output: &OutputManager) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.redis_url {
        config.store.redis_url = url;
    }

    let store = RedisStore::connect(&config.store.redis_url, config.store.key_prefix.clone())
        .await
        .with_context(|| format!("failed to connect to {}", config.store.redis_url))?;

    match cli.command {
        Commands::Ping => {
            store.ping().await?;
            output.success(&format!("store reachable (prefix '{}')", store.prefix()));
        }
        Commands::Purge { yes } => {
            if !yes {
                bail!("refusing to purge prefix '{}' without --yes", store.prefix());
            }
            let deleted = store.cleanup().await?;
            output.success(&format!("deleted {deleted} keys under '{}'", store.prefix()));
        }
        Commands::Stats { channel } => {
            let channel = EntityId::param("channelId", &channel)?;
            let client = connect_client(store, &config).await?;
            let stats = client.stats().channel_stats(&channel).await?;
            output.heading(&format!("Channel {}", stats.profile.username));
            output.display(&stats)?;
        }
        Commands::DeleteVideo { video, actor } => {
            let actor = EntityId::param("actor", &actor)?;
            let client = connect_client(store, &config).await?;
            match client.integrity().delete_video(&video, &actor).await {
                Ok(report) => {
                    output.display(&report)?;
                    output.success(&format!("video {} deleted", report.id));
                }
                Err(CoreError::Cascade(err)) => {
                    output.display(&err.report)?;
                    output.warning("some dependent records were not cleaned; run repair-video to retry");
                    for failed in err.report.cleanup_failures() {
                        output.bullet(failed.step.as_str());
                    }
                    return Err(CoreError::Cascade(err).into());
                }
                Err(CoreError::NotFound { .. }) => {
                    output.info("video not found; use repair-video to clean up after an earlier delete");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::RepairVideo { video } => {
            let client = connect_client(store, &config).await?;
            match client.integrity().repair_video_dependents(&video).await {
                Ok(report) => {
                    output.display(&report)?;
                    output.success("dependents cleaned");
                }
                Err(CoreError::Cascade(err)) => {
                    output.display(&err.report)?;
                    return Err(CoreError::Cascade(err).into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

async fn connect_client(store: RedisStore, config: &Config) -> Result<Client<RedisStore, LocalBlobStore>> {
    let blobs = LocalBlobStore::new(&config.blobs.root_dir)
        .await
        .with_context(|| format!("failed to open blob directory {}", config.blobs.root_dir.display()))?;
    Ok(Client::new(store, blobs).with_pagination(config.pagination))
}
