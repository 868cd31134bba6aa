//! CLI binary for playlist-covergen.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig` / `CollageConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use playlist_covergen::{
    compose_from_files, generate_and_upload, generate_cover_to_file, parse_hex_color,
    parse_playlist_ref, pipeline::decode::discover_images, pipeline::encode::save_canvas,
    AccessToken, CollageConfig, CoverProgressCallback, CoverStats, GeneratorConfig, GridPos,
    LargeCellPlacement, OutputFormat, ProgressCallback, SpotifyClient,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while tracks are fetched, then a bar over the images loaded.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new(initial_message: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message(initial_message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl CoverProgressCallback for CliProgressCallback {
    fn on_fetch_complete(&self, items: usize, partial: bool) {
        let marker = if partial { cyan("⚠") } else { green("✓") };
        let note = if partial { "  (listing stopped early)" } else { "" };
        self.bar
            .println(format!("  {} {} tracks fetched{}", marker, items, dim(note)));
    }

    fn on_generation_start(&self, required: usize) {
        let bar_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(required as u64);
        self.bar.set_style(bar_style);
        self.bar.set_prefix("Loading");
        self.bar.reset_eta();
    }

    fn on_image_loaded(&self, loaded: usize, _required: usize) {
        self.bar.set_position(loaded as u64);
    }

    fn on_image_failed(&self, source: &str, error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), dim(source), red(&msg)));
    }

    fn on_generation_complete(&self, used: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!("{} {} images placed", green("✔"), bold(&used.to_string()));
        } else {
            eprintln!(
                "{} {} images placed  ({} skipped)",
                cyan("⚠"),
                bold(&used.to_string()),
                red(&failed.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Cover for a playlist, written to cover.jpg
  covergen spotify:playlist:37i9dQZF1DXcBWIGoYBM5M

  # Replace the playlist's cover on the service
  covergen https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M --upload

  # Compose local album art
  covergen --images ./images -o sample-cover.png

  # Random large cells, reproducible
  covergen --images ./images --random-large 3 --seed 42

  # Playlists whose cover you may replace
  covergen --list-playlists

ENVIRONMENT VARIABLES:
  SPOTIFY_ACCESS_TOKEN    OAuth bearer token (scopes: playlist-read-private,
                          ugc-image-upload and playlist-modify-* for --upload)
  RUST_LOG                Override log filtering (e.g. playlist_covergen=debug)
"#;

/// Generate collage covers for playlists from their album art.
#[derive(Parser, Debug)]
#[command(
    name = "covergen",
    version,
    about = "Generate collage covers for playlists from their album art",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Playlist id, spotify:playlist:<id> URI or open.spotify.com URL.
    playlist: Option<String>,

    /// Compose from image files in this folder instead of a playlist.
    #[arg(long, env = "COVERGEN_IMAGES", conflicts_with = "playlist")]
    images: Option<PathBuf>,

    /// List your playlists whose cover can be replaced, then exit.
    #[arg(long, conflicts_with_all = ["playlist", "images"])]
    list_playlists: bool,

    /// OAuth access token.
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output image path. Default: cover.jpg / cover.png.
    #[arg(short, long, env = "COVERGEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Upload the cover to the playlist instead of only saving it.
    #[arg(long, requires = "playlist")]
    upload: bool,

    /// Canvas width in pixels.
    #[arg(long, env = "COVERGEN_WIDTH", default_value_t = 2048)]
    width: u32,

    /// Canvas height in pixels.
    #[arg(long, env = "COVERGEN_HEIGHT", default_value_t = 2048)]
    height: u32,

    /// Grid columns.
    #[arg(long, env = "COVERGEN_COLUMNS", default_value_t = 5)]
    columns: u32,

    /// Grid rows.
    #[arg(long, env = "COVERGEN_ROWS", default_value_t = 5)]
    rows: u32,

    /// Gap between cells in pixels.
    #[arg(long, env = "COVERGEN_GAP", default_value_t = 20)]
    gap: u32,

    /// Derive grid size and large-cell count from the number of images.
    #[arg(long, env = "COVERGEN_AUTO_GRID", conflicts_with_all = ["columns", "rows"])]
    auto_grid: bool,

    /// Anchor of a 2×2 cell as COL,ROW (repeatable). Default: 1,2 and 3,3.
    #[arg(long = "large-cell", value_name = "COL,ROW", value_parser = parse_grid_pos)]
    large_cells: Vec<GridPos>,

    /// Place this many 2×2 cells at random instead of fixed anchors.
    #[arg(long, env = "COVERGEN_RANDOM_LARGE", conflicts_with = "large_cells")]
    random_large: Option<u32>,

    /// Use single cells only.
    #[arg(long, conflicts_with_all = ["large_cells", "random_large"])]
    no_large_cells: bool,

    /// Seed for image order and random placement.
    #[arg(long, env = "COVERGEN_SEED")]
    seed: Option<u64>,

    /// Counter-clockwise rotation in degrees.
    #[arg(long, env = "COVERGEN_TILT", default_value_t = 20.0, allow_negative_numbers = true)]
    tilt: f32,

    /// Centre zoom factor (≥ 1.0).
    #[arg(long, env = "COVERGEN_ZOOM", default_value_t = 1.2)]
    zoom: f32,

    /// Background colour as #rrggbb.
    #[arg(long, env = "COVERGEN_BACKGROUND", default_value = "#2f3030")]
    background: String,

    /// Output encoding. Default: from the output extension, else JPEG.
    #[arg(long, env = "COVERGEN_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// JPEG quality (1–100).
    #[arg(long, env = "COVERGEN_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Stop after this many tracks.
    #[arg(long, env = "COVERGEN_MAX_TRACKS")]
    max_tracks: Option<usize>,

    /// Fail instead of repeating images when there are too few.
    #[arg(long, env = "COVERGEN_NO_REPEAT")]
    no_repeat: bool,

    /// Do not memoise cover lists.
    #[arg(long)]
    no_cache: bool,

    /// Per-request timeout in seconds.
    #[arg(long, env = "COVERGEN_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    /// Web API base URL.
    #[arg(long, env = "COVERGEN_API_URL", default_value = playlist_covergen::spotify::SPOTIFY_API_URL)]
    api_url: String,

    /// Print run statistics as JSON on stdout.
    #[arg(long, env = "COVERGEN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "COVERGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "COVERGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "COVERGEN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Jpeg,
    Png,
}

fn parse_grid_pos(s: &str) -> Result<GridPos, String> {
    let (col, row) = s
        .split_once(',')
        .ok_or_else(|| format!("expected COL,ROW, got '{s}'"))?;
    let col = col.trim().parse().map_err(|_| format!("bad column in '{s}'"))?;
    let row = row.trim().parse().map_err(|_| format!("bad row in '{s}'"))?;
    Ok(GridPos::new(col, row))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_playlists;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Playlist listing ─────────────────────────────────────────────────
    if cli.list_playlists {
        let config = generator_config(&cli, CollageConfig::default(), None)?;
        let client = SpotifyClient::new(token(&cli)?, &config)?;
        let playlists = client
            .editable_playlists()
            .await
            .context("Failed to list playlists")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&playlists).context("Failed to serialise playlists")?
            );
        } else {
            for p in &playlists {
                println!("{}  {:>5} tracks  {}", p.id, p.tracks.total, bold(&p.name));
            }
            if playlists.is_empty() && !cli.quiet {
                eprintln!("No playlists you own have at least 4 tracks.");
            }
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let message = if cli.images.is_some() { "Scanning images…" } else { "Fetching tracks…" };
        Some(CliProgressCallback::new(message) as Arc<dyn CoverProgressCallback>)
    } else {
        None
    };

    // ── Local folder ─────────────────────────────────────────────────────
    if let Some(ref dir) = cli.images {
        let files = discover_images(dir).context("Failed to scan image folder")?;
        let count = cli.auto_grid.then_some(files.len());
        let config = generator_config(&cli, collage_config(&cli, count)?, progress_cb)?;
        let output_path = output_path(&cli, &config);

        let cover = compose_from_files(&files, &config).context("Composition failed")?;
        save_canvas(&cover.image, &output_path, config.collage.output_format)
            .context("Failed to save cover")?;
        report(&cli, &cover.stats, Some(&output_path))?;
        return Ok(());
    }

    // ── Playlist ─────────────────────────────────────────────────────────
    let Some(ref playlist) = cli.playlist else {
        bail!("Pass a playlist, --images DIR or --list-playlists");
    };
    let token = token(&cli)?;

    let image_count = if cli.auto_grid {
        // Fills the cover cache, so the generation below reuses this walk.
        let probe = generator_config(&cli, CollageConfig::default(), None)?;
        let client = SpotifyClient::new(token.clone(), &probe)?;
        let id = parse_playlist_ref(playlist)?;
        let covers = client
            .album_covers(&id, cli.max_tracks)
            .await
            .context("Failed to fetch playlist tracks")?;
        Some(covers.urls.len())
    } else {
        None
    };
    let config = generator_config(&cli, collage_config(&cli, image_count)?, progress_cb)?;

    if cli.upload {
        let cover = generate_and_upload(playlist, token, &config)
            .await
            .context("Cover generation failed")?;
        if let Some(ref path) = cli.output {
            save_canvas(&cover.image, path, config.collage.output_format)
                .context("Failed to save cover")?;
        }
        if !cli.quiet && !cli.json {
            eprintln!("{} Uploaded new cover", green("✔"));
        }
        report(&cli, &cover.stats, cli.output.as_deref())?;
    } else {
        let output_path = output_path(&cli, &config);
        let cover = generate_cover_to_file(playlist, token, &output_path, &config)
            .await
            .context("Cover generation failed")?;
        report(&cli, &cover.stats, Some(&output_path))?;
    }

    Ok(())
}

fn token(cli: &Cli) -> Result<AccessToken> {
    match cli.token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Ok(AccessToken::new(t)),
        _ => bail!("An access token is required: pass --token or set SPOTIFY_ACCESS_TOKEN"),
    }
}

fn output_format(cli: &Cli) -> OutputFormat {
    let from_ext = cli
        .output
        .as_ref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("png"));
    match (cli.format, from_ext) {
        (Some(FormatArg::Png), _) | (None, Some(true)) => OutputFormat::Png,
        _ => OutputFormat::Jpeg {
            quality: cli.quality,
        },
    }
}

fn output_path(cli: &Cli, config: &GeneratorConfig) -> PathBuf {
    cli.output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("cover.{}", config.collage.output_format.extension())))
}

/// Map CLI args to `CollageConfig`. `image_count` is set with `--auto-grid`.
fn collage_config(cli: &Cli, image_count: Option<usize>) -> Result<CollageConfig> {
    let background = parse_hex_color(&cli.background)?;
    let mut builder = CollageConfig::builder()
        .size(cli.width, cli.height)
        .background(background)
        .gap(cli.gap)
        .rotation_degrees(cli.tilt)
        .zoom(cli.zoom)
        .output_format(output_format(cli));

    builder = match image_count {
        Some(n) => builder.auto_grid(n),
        None => builder.grid(cli.columns, cli.rows),
    };

    if let Some(count) = cli.random_large {
        builder = builder.large_cells(LargeCellPlacement::Random {
            count,
            seed: cli.seed,
        });
    } else if !cli.large_cells.is_empty() {
        builder = builder.large_cells(LargeCellPlacement::Fixed(cli.large_cells.clone()));
    } else if cli.no_large_cells {
        builder = builder.large_cells(LargeCellPlacement::none());
    }

    let mut config = builder.build()?;
    if let LargeCellPlacement::Random { seed, .. } = &mut config.large_cells {
        if seed.is_none() {
            *seed = cli.seed;
        }
    }
    Ok(config)
}

/// Map CLI args to `GeneratorConfig`.
fn generator_config(
    cli: &Cli,
    collage: CollageConfig,
    progress: Option<ProgressCallback>,
) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .api_base_url(&cli.api_url)
        .request_timeout_secs(cli.timeout)
        .repeat_images(!cli.no_repeat)
        .use_cache(!cli.no_cache)
        .collage(collage);

    if let Some(n) = cli.max_tracks {
        builder = builder.max_tracks(n);
    }
    if let Some(seed) = cli.seed {
        builder = builder.shuffle_seed(seed);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    Ok(builder.build()?)
}

fn report(cli: &Cli, stats: &CoverStats, path: Option<&Path>) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(stats).context("Failed to serialise stats")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    if stats.is_partial() {
        eprintln!(
            "{} Track listing stopped early; the cover uses the {} covers fetched before the failure",
            cyan("⚠"),
            stats.unique_covers
        );
    }
    if stats.has_repeats() {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} slots filled from fewer distinct images",
                stats.required_images
            ))
        );
    }
    if let Some(path) = path {
        eprintln!(
            "{}  {} images  {}ms  →  {}",
            green("✔"),
            stats.images_used,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }
    Ok(())
}
