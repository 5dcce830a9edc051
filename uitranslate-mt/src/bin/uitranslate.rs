use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uitranslate::ResourceFormat;
use uitranslate_mt::config::{GEMINI_API_KEY_VAR, GITHUB_TOKEN_VAR};
use uitranslate_mt::languages::{self, LANGUAGES};
use uitranslate_mt::{
    AppConfig, FsScanner, GeminiProvider, GithubScanner, MockGenerator, MockMode, MtError,
    RepoRef, RepositoryScanner, Route, ScanRequest, SingleCallTranslator, TextGenerator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("uitranslate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Translate UI string resources with a language model")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show detailed translation process")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML configuration file")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a resource file (.json, strings.xml, .strings)")
                .arg(
                    Arg::new("file")
                        .help("Source resource file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .index(1),
                )
                .arg(
                    Arg::new("language")
                        .help("Target language name or code (e.g., French, fr, zh-CN)")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Write the translated file here instead of stdout")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format: json, xml, strings (default: same as input)"),
                )
                .arg(
                    Arg::new("mock")
                        .long("mock")
                        .short('m')
                        .help("Use mock generator instead of Gemini")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("batch-only")
                        .long("batch-only")
                        .help("Skip the single-call attempt and translate in batches")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("per-entry-fallback")
                        .long("per-entry-fallback")
                        .help("Translate strings of a failed batch one by one")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("scan")
                .about("Find string resource files in a GitHub repository")
                .arg(
                    Arg::new("repo")
                        .help("Repository URL, optionally with /tree/<branch>")
                        .required(true)
                        .index(1),
                )
                .arg(Arg::new("branch").long("branch").short('b').help("Branch to scan"))
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .short('p')
                        .help("Glob pattern for resource paths (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("filename")
                        .long("filename")
                        .help("File name searched when no pattern matches")
                        .default_value("strings.xml"),
                )
                .arg(
                    Arg::new("no-pattern-search")
                        .long("no-pattern-search")
                        .help("Search by file name only")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("local")
                        .long("local")
                        .help("Scan a local checkout instead of the GitHub API")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("languages").about("List supported languages"))
        .get_matches();

    init_tracing(matches.get_flag("verbose"))?;

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.apply_env();

    match matches.subcommand() {
        Some(("translate", sub)) => translate(sub, config).await,
        Some(("scan", sub)) => scan(sub, config).await,
        Some(("languages", _)) => {
            for language in LANGUAGES.iter() {
                println!("{:<24} {}", language.name, language.code);
            }
            Ok(())
        }
        _ => Err("unknown command".into()),
    }
}

fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn translate(matches: &ArgMatches, mut config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let file = matches.get_one::<PathBuf>("file").ok_or("FILE is required")?;
    let language = matches
        .get_one::<String>("language")
        .ok_or("LANGUAGE is required")?;
    let verbose = matches.get_flag("verbose");

    let input_format = ResourceFormat::from_path(file)
        .ok_or_else(|| format!("Cannot tell the format of '{}'", file.display()))?;
    let output_format = match matches.get_one::<String>("format") {
        Some(name) => ResourceFormat::from_name(name).ok_or_else(|| format!("Unknown format '{}'", name))?,
        None => input_format,
    };

    let content = std::fs::read_to_string(file)?;
    let loaded = input_format.load(&content).map_err(|source| MtError::Resource {
        path: file.display().to_string(),
        source,
    })?;
    if !loaded.skipped.is_empty() {
        eprintln!(
            "⚠️  Skipping {} non-text value(s): {}",
            loaded.skipped.len(),
            loaded.skipped.join(", ")
        );
    }

    let target = languages::display_name(language);
    if verbose {
        println!("📝 Source: {} ({} strings)", file.display(), loaded.collection.len());
        println!("🌍 Target: {}", target);
        println!();
    }

    let generator: Arc<dyn TextGenerator> = if matches.get_flag("mock") {
        Arc::new(MockGenerator::new(MockMode::Suffix))
    } else {
        if config.gemini.api_key.is_empty() {
            eprintln!("❌ {} environment variable not set", GEMINI_API_KEY_VAR);
            eprintln!("   Set it with: export {}=your_api_key", GEMINI_API_KEY_VAR);
            eprintln!("   Or use --mock to use mock generator");
            return Err("Missing API key".into());
        }
        Arc::new(GeminiProvider::new(config.gemini.clone())?)
    };

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⏹️  Stopping after the current batch...");
            ctrl_c.cancel();
        }
    });

    if matches.get_flag("per-entry-fallback") {
        config.batch.per_entry_fallback = true;
    }
    let mut translator = SingleCallTranslator::new(generator, config.single_call, config.batch)
        .with_cancellation(token);
    if verbose {
        translator = translator.with_progress(|progress| {
            eprintln!(
                "📦 Batch {}/{} done ({} strings, {} untranslated)",
                progress.completed, progress.total, progress.size, progress.untranslated
            );
        });
    }
    let outcome = if matches.get_flag("batch-only") {
        translator
            .translate_in_batches(&loaded.collection, target)
            .await?
    } else {
        translator.translate_all(&loaded.collection, target).await?
    };

    if verbose {
        match &outcome.route {
            Route::SingleCall { .. } => println!("✅ Translated in a single call"),
            Route::Batched { reason, report } => {
                println!("📦 Translated in {} batch(es) ({:?})", report.batches.len(), reason);
            }
        }
    }
    if let Route::Batched { report, .. } = &outcome.route {
        for batch in report.batches.iter().filter(|b| !b.untranslated.is_empty()) {
            eprintln!(
                "⚠️  Batch {}: {} of {} strings kept their source text",
                batch.index + 1,
                batch.untranslated.len(),
                batch.size
            );
        }
    }
    let untranslated = outcome.untranslated_count();
    if untranslated > 0 {
        eprintln!(
            "⚠️  {} of {} strings are untranslated; re-run to retry them",
            untranslated,
            loaded.collection.len()
        );
    }

    let rendered = output_format.render(&outcome.translations)?;
    match matches.get_one::<PathBuf>("output") {
        Some(path) => {
            std::fs::write(path, rendered)?;
            if verbose {
                println!("💾 Wrote {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

async fn scan(matches: &ArgMatches, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let url = matches.get_one::<String>("repo").ok_or("REPO is required")?;
    let repo = RepoRef::parse(url)?;
    let branch = matches.get_one::<String>("branch").map(String::as_str);

    let mut request = ScanRequest {
        pattern_search: !matches.get_flag("no-pattern-search"),
        ..ScanRequest::default()
    };
    if let Some(patterns) = matches.get_many::<String>("pattern") {
        request.patterns = patterns.cloned().collect();
    }
    if let Some(filename) = matches.get_one::<String>("filename") {
        request.filename = filename.clone();
    }

    let scanner: Box<dyn RepositoryScanner> = match matches.get_one::<PathBuf>("local") {
        Some(dir) => Box::new(FsScanner::new(dir)),
        None => {
            if config.github.token.is_empty() {
                eprintln!(
                    "⚠️  {} not set; using unauthenticated GitHub requests",
                    GITHUB_TOKEN_VAR
                );
            }
            Box::new(GithubScanner::new(config.github.clone())?)
        }
    };

    let report = scanner.scan(&repo, branch, &request).await?;
    if report.files.is_empty() {
        println!("No '{}' files found in {}", request.filename, repo);
    }
    for (path, content) in &report.files {
        match ResourceFormat::from_path(Path::new(path)).map(|format| format.load(content)) {
            Some(Ok(loaded)) => println!("📄 {} ({} strings)", path, loaded.collection.len()),
            Some(Err(e)) => println!("📄 {} (unreadable: {})", path, e),
            None => println!("📄 {}", path),
        }
    }
    for failure in &report.failures {
        eprintln!("❌ {}: {}", failure.path, failure.reason);
    }
    Ok(())
}
