use anyhow::Result;
use captcha_arith::config::SolverConfig;
use captcha_arith::pipeline::CaptchaPipeline;
use captcha_arith::session::{Account, SessionClient};
use captcha_arith::solver::Solution;
use captcha_arith::store::CorrectionStore;
use image::DynamicImage;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const USAGE: &str = "Usage:
  captcha-arith <image file>...         solve captcha image files
  captcha-arith learn <raw> <corrected> record an operator correction
  captcha-arith fetch <captcha id>      fetch, solve and submit via the remote service

Environment:
  CAPTCHA_BACKGROUNDS_DIR  directory of candidate background images
  CAPTCHA_CORRECTIONS_FILE learned correction table (default corrections.json)
  CAPTCHA_TESSDATA_PATH    explicit tessdata directory
  CAPTCHA_SERVICE_URL      remote service origin (fetch mode)
  CAPTCHA_USERNAME         account username (fetch mode)
  CAPTCHA_PASSWORD         account password (fetch mode)";

/// Load candidate background images from the configured directory.
fn load_backgrounds() -> Result<Vec<DynamicImage>> {
    let dir = match env::var("CAPTCHA_BACKGROUNDS_DIR") {
        Ok(dir) if !dir.trim().is_empty() => dir,
        _ => {
            warn!("CAPTCHA_BACKGROUNDS_DIR not set, solving without background subtraction");
            return Ok(Vec::new());
        }
    };

    let mut backgrounds = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        match image::open(&path) {
            Ok(img) => backgrounds.push(img),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable background"),
        }
    }

    info!(count = backgrounds.len(), directory = %dir, "Loaded background images");
    Ok(backgrounds)
}

fn build_pipeline(config: SolverConfig) -> Result<CaptchaPipeline> {
    let backgrounds = load_backgrounds()?;
    let store = Arc::new(CorrectionStore::open(config.corrections_path())?);
    Ok(CaptchaPipeline::new(config, backgrounds, store)?)
}

fn report(label: &str, solution: &captcha_arith::CaptchaSolution) {
    match solution.solution {
        Solution::Answer(answer) => {
            println!("{}: {} = {}", label, solution.corrected, answer);
        }
        Solution::Unsolvable => {
            // Never guess: hand the raw and corrected text to the operator.
            println!(
                "{}: unsolvable (raw '{}', corrected '{}') - manual entry required",
                label, solution.raw, solution.corrected
            );
        }
    }
}

fn solve_files(pipeline: &CaptchaPipeline, paths: &[String]) -> Result<()> {
    for path in paths {
        let bytes = fs::read(path)?;
        let label = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());

        match pipeline.solve(&bytes) {
            Ok(solution) => report(&label, &solution),
            Err(e) => eprintln!("{}: {}", label, e),
        }
    }
    Ok(())
}

async fn fetch_and_solve(pipeline: &CaptchaPipeline, captcha_id: &str) -> Result<()> {
    let base_url = env::var("CAPTCHA_SERVICE_URL")
        .map_err(|_| anyhow::anyhow!("CAPTCHA_SERVICE_URL is required for fetch mode"))?;
    let username = env::var("CAPTCHA_USERNAME")
        .map_err(|_| anyhow::anyhow!("CAPTCHA_USERNAME is required for fetch mode"))?;
    let password = env::var("CAPTCHA_PASSWORD")
        .map_err(|_| anyhow::anyhow!("CAPTCHA_PASSWORD is required for fetch mode"))?;

    let client = SessionClient::new(base_url, 30)?;
    let mut account = Account::new(username, password);

    client.login(&mut account).await?;
    let bytes = client.fetch_captcha(&mut account, captcha_id).await?;

    let solution = pipeline.solve(&bytes)?;
    report(captcha_id, &solution);

    match solution.solution {
        Solution::Answer(answer) => {
            client
                .submit_solution(&mut account, &answer.to_string())
                .await?;
        }
        Solution::Unsolvable => {
            warn!(captcha_id, "Unsolvable captcha left pending for manual entry");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SolverConfig::from_env()?;

    let args: Vec<String> = env::args().skip(1).collect();
    match args.split_first() {
        None => {
            eprintln!("{}", USAGE);
            std::process::exit(2)
        }
        Some((cmd, rest)) if cmd == "learn" => {
            let [raw, corrected] = rest else {
                eprintln!("{}", USAGE);
                std::process::exit(2)
            };
            let store = CorrectionStore::open(config.corrections_path())?;
            store.record_correction(raw, corrected)?;
            println!("Recorded correction '{}' -> '{}'", raw, corrected);
            Ok(())
        }
        Some((cmd, rest)) if cmd == "fetch" => {
            let [captcha_id] = rest else {
                eprintln!("{}", USAGE);
                std::process::exit(2)
            };
            let pipeline = build_pipeline(config)?;
            fetch_and_solve(&pipeline, captcha_id).await
        }
        Some(_) => {
            let pipeline = build_pipeline(config)?;
            solve_files(&pipeline, &args)
        }
    }
}
