use clap::{Parser, Subcommand};
use srcsetter::config::{self, ServiceConfig};
use srcsetter::imaging::supported_input_extensions;
use srcsetter::process::{self, Package, ProcessSettings, Upload};
use srcsetter::resolve::RawParams;
use srcsetter::{output, server};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

/// Request fields shared by `render` and `batch`.
#[derive(clap::Args, Clone, Debug)]
struct EncodeArgs {
    /// Comma-separated target widths, e.g. "480,768,1200"
    #[arg(long)]
    widths: Option<String>,

    /// Comma-separated output formats: webp, avif
    #[arg(long)]
    formats: Option<String>,

    /// WebP quality, 1-100
    #[arg(long)]
    quality_webp: Option<String>,

    /// AVIF quality, 1-100
    #[arg(long)]
    quality_avif: Option<String>,

    /// Reject malformed widths, formats and qualities instead of ignoring them
    #[arg(long)]
    strict: bool,

    /// Add manifest.json with SHA-256 digests to the archive
    #[arg(long)]
    manifest: bool,

    /// Archive path (default: the suggested archive name in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl EncodeArgs {
    fn raw_params(&self) -> RawParams {
        RawParams {
            widths: self.widths.clone(),
            formats: self.formats.clone(),
            quality_webp: self.quality_webp.clone(),
            quality_avif: self.quality_avif.clone(),
            ..RawParams::default()
        }
    }

    /// CLI runs are not subject to the service's upload limits.
    fn settings(&self, config: &ServiceConfig) -> ProcessSettings {
        let base = ProcessSettings::from_service_config(config);
        ProcessSettings {
            strict: base.strict || self.strict,
            include_manifest: base.include_manifest || self.manifest,
            max_upload_bytes: usize::MAX,
            max_batch_images: usize::MAX,
            ..base
        }
    }
}

#[derive(Parser)]
#[command(name = "srcsetter")]
#[command(about = "Responsive image derivatives and srcset markup")]
#[command(long_about = "\
Responsive image derivatives and srcset markup

Resizes an image to a set of target widths, encodes each width as WebP
and/or AVIF, and writes a zip archive with the derivatives plus a snippet
file holding ready-to-paste <img srcset> and <picture> markup.

Widths larger than the source are skipped, never upscaled.

Archive contents:

  hero-responsive.zip
  ├── hero-480.webp
  ├── hero-480.avif
  ├── hero-768.webp
  ├── hero-768.avif
  └── snippet.html               # snippets.html for batches

Run 'srcsetter gen-config' to generate a documented srcsetter.toml.")]
#[command(version = srcsetter::version_string())]
struct Cli {
    /// Config file (default: ./srcsetter.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate derivatives and markup for one image
    Render {
        /// Source image (JPEG, PNG, TIFF or WebP)
        file: PathBuf,

        #[command(flatten)]
        encode: EncodeArgs,

        /// Base name for derivative files (default: the file's stem)
        #[arg(long)]
        basename: Option<String>,

        /// Verbatim `sizes` attribute (default: generated from the widths)
        #[arg(long)]
        sizes: Option<String>,

        /// Also print the snippet document to stdout
        #[arg(long)]
        print_markup: bool,
    },
    /// Generate derivatives and markup for many images; directories are walked
    Batch {
        /// Image files and/or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        encode: EncodeArgs,
    },
    /// Run the HTTP service
    Serve {
        /// Listen host (overrides [server] host)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a stock srcsetter.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config_path = cli
        .config
        .clone()
        .or_else(|| config::discover_config(Path::new(".")));
    let mut service_config = config::load_config(config_path.as_deref())?;
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Render {
            file,
            encode,
            basename,
            sizes,
            print_markup,
        } => {
            init_thread_pool(&service_config.processing);
            let upload = Upload {
                name: file_name(&file),
                bytes: std::fs::read(&file)?,
            };
            let raw = RawParams {
                basename,
                sizes,
                ..encode.raw_params()
            };
            let package =
                process::process_single(Some(upload), &raw, &encode.settings(&service_config))?;
            write_package(&package, encode.output.as_deref())?;
            if print_markup {
                print!("{}", package.document);
            }
        }
        Command::Batch { paths, encode } => {
            init_thread_pool(&service_config.processing);
            let uploads = collect_inputs(&paths)?
                .into_iter()
                .map(|path| -> std::io::Result<Upload> {
                    Ok(Upload {
                        name: file_name(&path),
                        bytes: std::fs::read(&path)?,
                    })
                })
                .collect::<Result<Vec<_>, std::io::Error>>()?;
            let package = process::process_batch(
                uploads,
                &encode.raw_params(),
                &encode.settings(&service_config),
            )?;
            write_package(&package, encode.output.as_deref())?;
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                service_config.server.host = host;
            }
            if let Some(port) = port {
                service_config.server.port = port;
            }
            init_thread_pool(&service_config.processing);
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(&service_config))?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for summaries and markup.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "srcsetter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| supported_input_extensions().contains(&e.as_str()))
}

/// Expand directories into their supported image files, sorted by path.
/// Explicit file arguments are kept as given.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn write_package(package: &Package, destination: Option<&Path>) -> std::io::Result<()> {
    let destination = destination
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&package.file_name));
    std::fs::write(&destination, &package.archive)?;
    output::print_package(package, &destination);
    Ok(())
}
