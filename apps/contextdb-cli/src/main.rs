use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contextdb_core::config::{expand_path, Config, KeywordMode, Settings};
use contextdb_core::error::Error;
use contextdb_core::loader::load_text_documents;
use contextdb_retrieval::{build_context, explain, ContextEngine, RetrieveOptions};

const USAGE: &str = "Usage:
  contextdb query <query> [--dir D] [--top-k N] [--range N] [--no-neighbors]
                          [--decay F] [--threshold F] [--keyword off|fallback|hybrid]
                          [--max-tokens N] [--json]
  contextdb stats [--dir D]";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Query(QueryArgs),
    Stats { dir: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq)]
struct QueryArgs {
    query: String,
    dir: Option<String>,
    top_k: Option<usize>,
    range: Option<usize>,
    no_neighbors: bool,
    decay: Option<f32>,
    threshold: Option<f32>,
    keyword: Option<KeywordMode>,
    max_tokens: usize,
    json: bool,
}

fn flag_value<T: std::str::FromStr>(args: &[String], i: &mut usize) -> anyhow::Result<T> {
    let flag = &args[*i];
    *i += 1;
    let raw = args.get(*i).with_context(|| format!("{flag} requires a value"))?;
    raw.parse::<T>().map_err(|_| anyhow::anyhow!("{flag}: invalid value '{raw}'"))
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let Some((cmd, rest)) = args.split_first() else { bail!("missing command") };
    match cmd.as_str() {
        "query" => {
            let mut q = QueryArgs { max_tokens: 2000, ..QueryArgs::default() };
            let mut positional = Vec::new();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--dir" => q.dir = Some(flag_value(rest, &mut i)?),
                    "--top-k" | "-k" => q.top_k = Some(flag_value(rest, &mut i)?),
                    "--range" => q.range = Some(flag_value(rest, &mut i)?),
                    "--decay" => q.decay = Some(flag_value(rest, &mut i)?),
                    "--threshold" => q.threshold = Some(flag_value(rest, &mut i)?),
                    "--keyword" => q.keyword = Some(flag_value(rest, &mut i)?),
                    "--max-tokens" => q.max_tokens = flag_value(rest, &mut i)?,
                    "--no-neighbors" => q.no_neighbors = true,
                    "--json" => q.json = true,
                    other if other.starts_with("--") => bail!("unknown flag {other}"),
                    other => positional.push(other.to_string()),
                }
                i += 1;
            }
            if positional.is_empty() {
                bail!("query text is required");
            }
            q.query = positional.join(" ");
            Ok(Command::Query(q))
        }
        "stats" => {
            let mut dir = None;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--dir" => dir = Some(flag_value(rest, &mut i)?),
                    other => bail!("unexpected argument {other}"),
                }
                i += 1;
            }
            Ok(Command::Stats { dir })
        }
        other => bail!("unknown command {other}"),
    }
}

impl QueryArgs {
    fn options(&self, defaults: &RetrieveOptions) -> RetrieveOptions {
        let mut o = defaults.clone();
        if let Some(k) = self.top_k { o.top_k = k; }
        if let Some(r) = self.range { o.neighbor_range = r; }
        if let Some(d) = self.decay { o.decay_factor = d; }
        if self.threshold.is_some() { o.similarity_threshold = self.threshold; }
        if let Some(k) = self.keyword { o.keyword = k; }
        if self.no_neighbors { o.include_neighbors = false; }
        o
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CONTEXTDB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

/// Load every text file under the data directory into a fresh engine.
async fn build_engine(settings: &Settings, dir: Option<&str>) -> anyhow::Result<ContextEngine> {
    let dir: PathBuf = expand_path(dir.unwrap_or(settings.data.raw_txt_dir.as_str()));
    if !dir.is_dir() {
        bail!("data directory {} does not exist", dir.display());
    }
    let documents = load_text_documents(&dir)?;
    info!(dir = %dir.display(), documents = documents.len(), "loading documents");
    let engine = ContextEngine::from_settings(settings)?;

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?
            .progress_chars("#>-"),
    );
    for doc in &documents {
        pb.set_message(doc.document_id.clone());
        match engine.ingest(&doc.document_id, &doc.text).await {
            Ok(_) => {}
            Err(e @ Error::DuplicateChunk { .. }) => warn!(document_id = %doc.document_id, error = %e, "skipping document"),
            Err(e) => return Err(e).with_context(|| format!("failed to index {}", doc.document_id)),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(engine)
}

async fn run_query(settings: &Settings, args: &QueryArgs) -> anyhow::Result<()> {
    let engine = build_engine(settings, args.dir.as_deref()).await?;
    let options = args.options(engine.default_options());
    options.validate()?;
    let results = match engine.query_with(&args.query, &options).await {
        Ok(results) => results,
        Err(Error::NoResults(reason)) => {
            println!("No results: {reason}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        let out = serde_json::json!({
            "query": args.query,
            "results": results,
            "summary": explain(&results),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let summary = explain(&results);
        println!(
            "{} results ({} matches, {} context) from {} documents",
            summary.total_results,
            summary.primary_count,
            summary.neighbor_count,
            summary.sources.len()
        );
        println!();
        print!("{}", build_context(&results, args.max_tokens));
    }
    Ok(())
}

async fn run_stats(settings: &Settings, dir: Option<&str>) -> anyhow::Result<()> {
    let engine = build_engine(settings, dir).await?;
    let stats = engine.index().stats();
    println!("documents: {}", stats.total_documents);
    println!("chunks:    {}", stats.total_chunks);
    println!("dim:       {}", stats.dim);
    println!("metric:    {:?}", stats.metric);
    println!("terms:     {}", stats.keyword_terms);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    let settings = Config::load()
        .and_then(|c| c.settings())
        .map_err(|e| { eprintln!("Error loading config: {e}"); e })?;

    match command {
        Command::Query(q) => run_query(&settings, &q).await,
        Command::Stats { dir } => run_stats(&settings, dir.as_deref()).await,
    }
}
