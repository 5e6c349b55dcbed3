use chrono::Utc;
use clap::{Parser, Subcommand};
use sitepress::config::{BuildOptions, SiteConfig, SyncMode};
use sitepress::deploy::{self, ArtifactIndex, DeployOverrides, S3Settings, SyncOptions};
use sitepress::deploy::s3::S3Store;
use sitepress::{config, generate, output, scan};
use std::path::{Path, PathBuf};

/// Release builds report the crate version; anything else reports the
/// commit, with `+dirty` for uncommitted changes.
fn version_string() -> &'static str {
    if env!("SITEPRESS_ON_RELEASE_TAG") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    let hash = env!("SITEPRESS_GIT_HASH");
    if hash.is_empty() {
        return "dev@unknown";
    }
    let dirty = if env!("SITEPRESS_GIT_DIRTY") == "true" { "+dirty" } else { "" };
    Box::leak(format!("dev@{hash}{dirty}").into_boxed_str())
}

/// Flags of the build stage.
#[derive(clap::Args, Clone, Default)]
struct BuildArgs {
    /// Base URL for every emitted link, overriding `baseURL`
    #[arg(long)]
    base_url: Option<String>,
    /// Minify HTML and XML output
    #[arg(long)]
    minify: bool,
    /// Include draft pages
    #[arg(long)]
    build_drafts: bool,
    /// Include pages dated in the future
    #[arg(long)]
    build_future: bool,
}

/// Flags of the deploy stage.
#[derive(clap::Args, Clone, Default)]
struct DeployArgs {
    /// Target bucket, overriding `deployment.bucket`
    #[arg(long)]
    bucket: Option<String>,
    /// S3 API endpoint, overriding `deployment.endpoint` and SITEPRESS_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,
    /// Bucket region, overriding `deployment.region`
    #[arg(long)]
    region: Option<String>,
    /// Stale-object policy, overriding `deployment.mode`
    #[arg(long, value_enum)]
    mode: Option<SyncMode>,
    /// Print the sync plan without changing the bucket
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
#[command(name = "sitepress")]
#[command(about = "Build a Markdown content tree into a static site and deploy it")]
#[command(long_about = "\
Build a Markdown content tree into a static site and deploy it

Site structure:

  site/
  ├── config.yaml                  # Site config (run 'sitepress gen-config')
  ├── content/
  │   ├── _index.md                # Home section title and intro
  │   ├── search.md                # layout: search → client-side search page
  │   └── basics/                  # Section → /basics/
  │       ├── _index.md            # Section title, weight, intro
  │       ├── variables.md         # Page → /basics/variables/
  │       └── diagram.png          # Resource, copied next to the page
  └── static/                      # Copied to the output root as-is

Pages are listed by front-matter weight, then path. Drafts and future-dated
pages are left out unless --build-drafts / --build-future are given.

Deploy credentials come from SITEPRESS_ACCESS_KEY / SITEPRESS_SECRET_KEY
(or AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY). RUST_LOG=debug shows every
file and request.")]
#[command(version = version_string())]
struct Cli {
    /// Site root (holds config.yaml, content/ and static/)
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "public", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the content tree and print it
    Scan {
        /// Print the manifest as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Validate config and content by building in memory; writes nothing
    Check(BuildArgs),
    /// Build the site into the output directory
    Build(BuildArgs),
    /// Sync the output directory to the bucket
    Deploy(DeployArgs),
    /// Build, then deploy
    Publish {
        #[command(flatten)]
        build: BuildArgs,
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Print a stock config.yaml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Scan { json } => {
            let manifest = scan::scan(&cli.source)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                output::print_scan_output(&manifest);
            }
        }
        Command::Check(args) => {
            println!("==> Checking {}", cli.source.display());
            let manifest = scan::scan(&cli.source)?;
            let built = generate::build(&manifest, &build_options(&manifest.config, args), &cli.source)?;
            output::print_build_output(&built.report);
            println!("==> Content is valid");
        }
        Command::Build(args) => {
            run_build(&cli.source, &cli.output, args)?;
        }
        Command::Deploy(args) => {
            let config = config::load_config(&cli.source)?;
            run_deploy(&config, &cli.output, args, 1)?;
        }
        Command::Publish {
            build,
            deploy: deploy_args,
        } => {
            let config = run_build(&cli.source, &cli.output, build)?;
            run_deploy(&config, &cli.output, deploy_args, 3)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_yaml());
        }
    }

    Ok(())
}

fn build_options(config: &SiteConfig, args: &BuildArgs) -> BuildOptions {
    let mut options = BuildOptions::from_config(config, Utc::now());
    options.base_url = args.base_url.clone();
    options.minify |= args.minify;
    options.build_drafts |= args.build_drafts;
    options.build_future |= args.build_future;
    options
}

/// Stages 1 and 2. Returns the loaded config for a following deploy.
fn run_build(source: &Path, out_dir: &Path, args: &BuildArgs) -> Result<SiteConfig, Box<dyn std::error::Error>> {
    println!("==> Stage 1: Scanning {}", source.display());
    let manifest = scan::scan(source)?;
    println!(
        "{} sections, {} pages",
        manifest.sections.len(),
        manifest.documents.len()
    );

    println!("==> Stage 2: Building → {}", out_dir.display());
    let built = generate::build(&manifest, &build_options(&manifest.config, args), source)?;
    built.artifact.write_to(out_dir, source)?;
    output::print_build_output(&built.report);

    println!("==> Build complete: {}", out_dir.display());
    Ok(manifest.config)
}

fn run_deploy(
    config: &SiteConfig,
    out_dir: &Path,
    args: &DeployArgs,
    stage: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let overrides = DeployOverrides {
        bucket: args.bucket.clone(),
        endpoint: args.endpoint.clone(),
        region: args.region.clone(),
        mode: args.mode,
    };
    let settings = S3Settings::resolve(&config.deployment, &overrides, |name| std::env::var(name).ok())?;
    let mut options = SyncOptions::from_config(&config.deployment);
    if let Some(mode) = overrides.mode {
        options.mode = mode;
    }
    options.dry_run = args.dry_run;

    println!(
        "==> Stage {stage}: Deploying {} → {} ({:?})",
        out_dir.display(),
        settings.bucket,
        options.mode
    );
    let local = ArtifactIndex::from_dir(out_dir)?;
    let store = S3Store::new(&settings)?;
    let report = deploy::sync(&local, &store, &options)?;
    output::print_sync_report(&report);
    println!("==> Deploy complete: {}", settings.bucket);
    Ok(())
}
