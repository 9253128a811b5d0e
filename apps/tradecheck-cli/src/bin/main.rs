use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradecheck_core::config::{resolve_with_base, Config, Settings};
use tradecheck_core::rules::RuleLibrary;
use tradecheck_core::traits::DocumentClassifier;
use tradecheck_llm::prompt::load_system_prompt;
use tradecheck_llm::{Analyzer, FallbackChain, LlmClassifier, LlmSettings, PromptBuilder, TradeDocument};
use tradecheck_retrieval::RetrievalContext;
use tradecheck_text::HeuristicClassifier;

const USAGE: &str = "Usage: tradecheck <retrieve <document.txt> [k] | detect <document.txt> | analyze <document.txt>...>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn read_document(path: &Path) -> anyhow::Result<TradeDocument> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(TradeDocument::new(name, String::from_utf8_lossy(&bytes)))
}

fn document_arg(args: &[String]) -> anyhow::Result<PathBuf> {
    match args.first() {
        Some(p) => Ok(PathBuf::from(p)),
        None => bail!(USAGE),
    }
}

fn build_context(settings: &Settings, cwd: &Path) -> anyhow::Result<RetrievalContext> {
    let rules_dir = resolve_with_base(cwd, &settings.data.rules_dir);
    let library = RuleLibrary::from_dir(&rules_dir).with_context(|| format!("loading rules from {}", rules_dir.display()))?;
    Ok(RetrievalContext::new(settings.retrieval.clone(), settings.rules.clone(), library)?)
}

fn analyze(config: &Config, settings: &Settings, cwd: &Path, paths: &[String]) -> anyhow::Result<()> {
    if paths.is_empty() { bail!(USAGE); }
    let context = build_context(settings, cwd)?;
    let llm = LlmSettings::from_config(config)?;
    let prompt_path = settings.prompt.system_prompt_path.as_ref().map(|p| resolve_with_base(cwd, p));
    let system_prompt = load_system_prompt(prompt_path.as_deref()).context("reading system prompt")?;
    let analyzer = Analyzer::new(FallbackChain::from_settings(&llm)?, PromptBuilder::new(system_prompt, settings.prompt.clone()));
    let classifier = LlmClassifier::new(HeuristicClassifier::new()?, FallbackChain::from_settings(&llm)?);

    let reports_dir = resolve_with_base(cwd, &settings.data.reports_dir);
    fs::create_dir_all(&reports_dir).with_context(|| format!("creating {}", reports_dir.display()))?;

    let runtime = tokio::runtime::Runtime::new()?;
    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?.progress_chars("#>-"));
    for path in paths {
        let document = read_document(Path::new(path))?;
        pb.set_message(document.name.clone());
        let report = runtime.block_on(async {
            let doc_type = classifier.classify(&document.text).await;
            let fragments = context.retrieve_for(&document.text, doc_type)?;
            info!(document = %document.name, %doc_type, fragments = fragments.len(), "rules retrieved");
            anyhow::Ok(analyzer.analyze(&document, &fragments).await)
        })?;
        let stem = Path::new(&document.name).file_stem().map_or_else(|| document.name.clone(), |s| s.to_string_lossy().into_owned());
        let out = reports_dir.join(format!("{stem}_compliance_report.json"));
        fs::write(&out, serde_json::to_string_pretty(&report)?).with_context(|| format!("writing {}", out.display()))?;
        pb.inc(1);
        match &report.error {
            Some(error) => pb.println(format!("⚠️  {}: {error}", document.name)),
            None => pb.println(format!(
                "📄 {}: {} discrepancies, {} compliances -> {}",
                document.name,
                report.discrepancy_count(),
                report.compliance_count(),
                out.display()
            )),
        }
    }
    pb.finish_with_message("✅ analysis complete");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let cwd = env::current_dir()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "detect" => {
            let document = read_document(&document_arg(&args)?)?;
            println!("{}", HeuristicClassifier::new()?.classify(&document.text));
        }
        "retrieve" => {
            let document = read_document(&document_arg(&args)?)?;
            let k = match args.get(1) {
                Some(k) => k.parse::<usize>().with_context(|| format!("k must be a non-negative integer, got '{k}'"))?,
                None => settings.retrieval.top_k,
            };
            let context = build_context(&settings, &cwd)?;
            let doc_type = HeuristicClassifier::new()?.classify(&document.text);
            let results = context.retrieve_top(&document.text, doc_type, k)?;
            let out = json!({ "document": document.name, "document_type": doc_type, "results": results });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "analyze" => analyze(&config, &settings, &cwd, &args)?,
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}
