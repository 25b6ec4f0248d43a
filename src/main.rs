//! DD4hep recipe CLI
//!
//! Inspect the recipe, resolve build plans and drive builds.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use package::builder::{BuildOptions, Builder, CommandTool, Toolchain};
use package::environment::EnvironmentModifications;
use package::recipe::VersionSource;
use package::variant::VariantKind;
use package::{catalog, Config, Package, ResolveRequest, Resolver, ValidationIssue, Version};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dd4hep-recipe",
    about = "Resolve, inspect and build the DD4hep package recipe",
    version,
    author
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "DD4HEP_RECIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Package to operate on
    #[arg(short, long, global = true, default_value = "dd4hep")]
    package: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata, versions and variants
    Info,

    /// Print the archive URL for a version
    Url(UrlArgs),

    /// Lint the recipe
    Validate,

    /// Resolve a request into defines, patches and dependencies
    Resolve(ResolveArgs),

    /// Print the run environment for an installation prefix
    Env(EnvArgs),

    /// Configure, build and install from an unpacked source tree
    Build(BuildArgs),
}

#[derive(Args)]
struct UrlArgs {
    /// Version (e.g. 1.32, 1.12.1, master)
    version: String,
}

#[derive(Args)]
struct ResolveArgs {
    /// Request file (TOML)
    #[arg(short, long)]
    request: PathBuf,

    /// Print the full resolution as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EnvArgs {
    /// Installation prefix
    #[arg(long)]
    prefix: PathBuf,

    /// Print modifications as JSON instead of shell exports
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BuildArgs {
    /// Request file (TOML)
    #[arg(short, long)]
    request: PathBuf,

    /// Unpacked source directory
    #[arg(long)]
    source: PathBuf,

    /// Installation prefix
    #[arg(long)]
    prefix: PathBuf,

    /// Build directory (defaults to the stage directory)
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Run the test suite after installation
    #[arg(long)]
    test: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pkg = match catalog::lookup(&cli.package) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Info => cmd_info(pkg.as_ref()),
        Commands::Url(args) => cmd_url(pkg.as_ref(), args),
        Commands::Validate => cmd_validate(pkg.as_ref()),
        Commands::Resolve(args) => cmd_resolve(pkg.as_ref(), args),
        Commands::Env(args) => cmd_env(pkg.as_ref(), args),
        Commands::Build(args) => cmd_build(pkg.as_ref(), &config, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_info(pkg: &dyn Package) -> Result<()> {
    let recipe = pkg.recipe();

    println!("{}", style(&recipe.name).green().bold());
    println!("    {}", recipe.description);
    println!();
    println!("Homepage:    {}", recipe.homepage);
    println!("License:     {}", recipe.license);
    println!("Maintainers: {}", recipe.maintainers.join(", "));
    println!("Generator:   {}", recipe.generator.cmake_name());
    if !recipe.extends.is_empty() {
        println!("Extends:     {}", recipe.extends.join(", "));
    }

    println!();
    println!("{}", style("Versions:").bold());
    for decl in recipe.versions_newest_first() {
        let source = match &decl.source {
            VersionSource::Branch(branch) => format!("branch {}", branch),
            VersionSource::Sha256(_) => pkg.url_for_version(&decl.version)?,
        };
        println!("    {:<10} {}", style(&decl.version).cyan(), source);
    }

    println!();
    println!("{}", style("Variants:").bold());
    for variant in &recipe.variants {
        let values = match &variant.kind {
            VariantKind::Bool => "on, off".to_string(),
            VariantKind::Single { values } => values.join(", "),
        };
        print!(
            "    {:<14} [{}] {}",
            style(&variant.name).cyan(),
            variant.default,
            values
        );
        if variant.is_conditional() {
            print!(" (when {})", variant.when);
        }
        println!();
        println!("        {}", variant.description);
    }

    Ok(())
}

fn cmd_url(pkg: &dyn Package, args: UrlArgs) -> Result<()> {
    let version = Version::parse(&args.version)?;
    println!("{}", pkg.url_for_version(&version)?);
    Ok(())
}

fn cmd_validate(pkg: &dyn Package) -> Result<()> {
    let result = pkg.validate();

    for issue in &result.issues {
        match issue {
            ValidationIssue::Error(_) => println!("{}", style(issue).red()),
            ValidationIssue::Warning(_) => println!("{}", style(issue).yellow()),
        }
    }

    if !result.is_ok() {
        bail!(
            "{} failed validation with {} error(s)",
            result.package,
            result.errors().len()
        );
    }

    println!(
        "{} {} is valid ({} warning(s))",
        style(">>>").green().bold(),
        result.package,
        result.warnings().len()
    );
    Ok(())
}

fn cmd_resolve(pkg: &dyn Package, args: ResolveArgs) -> Result<()> {
    let request = ResolveRequest::load(&args.request)
        .with_context(|| format!("reading request {}", args.request.display()))?;
    let resolution = Resolver::new(pkg).resolve(&request)?;

    if args.json {
        println!("{}", resolution.to_json()?);
        return Ok(());
    }

    println!("{} {}", style(">>>").green().bold(), resolution.spec);
    println!("Source: {}", resolution.source);

    println!("{}", style("Dependencies:").bold());
    for dep in &resolution.dependencies {
        match &dep.state {
            Some(state) => println!("    {} -> {}", dep, state),
            None => println!("    {}", dep),
        }
    }

    println!("{}", style("Patches:").bold());
    for patch in &resolution.patches {
        println!("    {}", patch.source);
    }

    println!("{}", style("CMake arguments:").bold());
    for arg in resolution.cmake_args() {
        println!("    {}", arg);
    }

    Ok(())
}

fn cmd_env(pkg: &dyn Package, args: EnvArgs) -> Result<()> {
    let mut env = EnvironmentModifications::new();
    pkg.setup_run_environment(&args.prefix, &mut env)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&env)?);
    } else {
        print!("{}", env.to_shell());
    }
    Ok(())
}

async fn cmd_build(pkg: &dyn Package, config: &Config, args: BuildArgs) -> Result<()> {
    let mut request = ResolveRequest::load(&args.request)
        .with_context(|| format!("reading request {}", args.request.display()))?;
    if args.test || config.run_tests {
        request.run_tests = true;
    }

    let resolution = Resolver::new(pkg).resolve(&request)?;
    let toolchain = Toolchain::locate(config, resolution.generator)?;

    let build_dir = args.build_dir.unwrap_or_else(|| {
        config.build_dir_for(&resolution.spec.name, &resolution.spec.version.to_string())
    });
    let opts = BuildOptions {
        source_dir: args.source,
        build_dir,
        prefix: args.prefix,
        jobs: args.jobs.unwrap_or(config.jobs),
        build_type: config.build_type.clone(),
    };

    let tool = CommandTool;
    let report = Builder::new(&toolchain, &tool)
        .build(pkg, &resolution, &opts)
        .await?;

    info!("Phases: {:?}", report.phases);
    println!(
        "{} Installed {} to {} in {:.1}s",
        style(">>>").green().bold(),
        resolution.spec,
        report.prefix.display(),
        report.duration.as_secs_f64()
    );
    Ok(())
}
