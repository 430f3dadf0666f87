use anyhow::{anyhow, Context};
use detect_ai_lib::models::{AnalysisResult, ContentKind, ContentPayload};
use detect_ai_lib::services::{kind_for_path, load_payload, AnalysisClient, ConfigStore, SessionController};
use reqwest::Url;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

const USAGE: &str = "Usage:
  detect_file <path|-> [--kind text|image|video] [--url <base_url>] [--out <json_path>]
  detect_file --set-url <base_url> [<path|-> ...]

Notes:
  - `-` reads text from stdin.
  - Without --kind the kind is inferred from the file extension.
  - The backend URL defaults to the stored config (or DETECTAI_API_URL).
  - --set-url saves the backend URL to the config file before anything else runs.";

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 4] = ["--kind", "--url", "--out", "--set-url"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    source: &'a str,
    kind: ContentKind,
    result: &'a AnalysisResult,
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    source: Option<String>,
    kind: Option<String>,
    url: Option<String>,
    out: Option<String>,
    set_url: Option<String>,
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            let value = rest
                .next()
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", arg))?;
            let slot = match arg.as_str() {
                "--kind" => &mut parsed.kind,
                "--url" => &mut parsed.url,
                "--out" => &mut parsed.out,
                _ => &mut parsed.set_url,
            };
            *slot = Some(value);
        } else if arg.starts_with("--") {
            return Err(anyhow!("unknown option {}", arg));
        } else if parsed.source.is_none() {
            parsed.source = Some(arg.clone());
        }
    }
    Ok(parsed)
}

fn read_stdin_text() -> anyhow::Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("read stdin failed")?;
    Ok(text)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) if cli.source.is_some() || cli.set_url.is_some() => cli,
        Ok(_) => {
            eprintln!("{}", USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}", USAGE);
            return Err(e);
        }
    };

    detect_ai_lib::init_logging();

    if let Some(base) = &cli.set_url {
        let store = ConfigStore::from_env()?;
        let saved = store
            .set_backend_url(base)
            .with_context(|| format!("cannot save backend URL {}", base))?;
        println!("Backend URL saved: {} ({})", saved, store.config_file().display());
    }

    let Some(source) = cli.source.clone() else {
        return Ok(());
    };

    let kind = match &cli.kind {
        Some(k) => ContentKind::parse(k).ok_or_else(|| anyhow!("unknown kind {:?}", k))?,
        None if source == "-" => ContentKind::Text,
        None => kind_for_path(Path::new(&source))
            .ok_or_else(|| anyhow!("cannot infer content kind of {}, pass --kind", source))?,
    };

    let payload = if source == "-" {
        ContentPayload::Text(read_stdin_text()?)
    } else {
        load_payload(Path::new(&source), kind).with_context(|| format!("read {} failed", source))?
    };

    let mut ctl = match &cli.url {
        Some(url) => {
            let base = Url::parse(url).with_context(|| format!("invalid --url {}", url))?;
            SessionController::new(AnalysisClient::new(base))
        }
        None => detect_ai_lib::build_controller()?,
    };

    println!("Source: {}", source);
    println!("Kind: {}", kind);
    println!("Payload: {}", payload.describe());

    ctl.login(true)?;
    ctl.choose_kind(kind)?;
    ctl.set_payload(payload)?;
    ctl.submit_analysis().await?;

    let result = ctl
        .state()
        .result
        .as_ref()
        .ok_or_else(|| anyhow!("analysis finished without a result"))?;
    print!("{}", detect_ai_lib::terminal::render_result(result));

    let report = Report {
        source: &source,
        kind,
        result,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &cli.out {
        Some(p) => {
            std::fs::write(p, json).with_context(|| format!("write {} failed", p))?;
            println!("Wrote: {}", p);
        }
        None => println!("{}", json),
    }

    Ok(())
}
