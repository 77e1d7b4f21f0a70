//! Event load generator
//!
//! Generates synthetic sensor events against a running verdict server and
//! verifies persistence end to end: resolve, escalate every unknown hash
//! through a scan, re-resolve and require the stored levels to be observed.
//! Events flow through the bounded dispatch pool so at most `--parallel`
//! verifications are in flight at once.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use hashguard_cloud::dispatch::DispatchPool;
use hashguard_cloud::models::{
    Device, Event, EventsResponse, FileObservation, FileTimes, ProcessObservation, VerdictRecord,
    RISK_UNKNOWN,
};

const ROOT_DIRS: &[&str] = &["srv", "opt", "sys", "home", "var", "etc", "tmp"];
const VENDOR_DIRS: &[&str] = &["hashguard", "edr-agent", "scratch", "a dir with spaces"];
const EXTENSIONS: &[&str] = &[
    "exe", "elf", "so", "png", "jpg", "mp3", "doc", "pptx", "pdf", "js", "py",
];

#[derive(Parser, Debug)]
#[command(name = "loadgen", about = "HashGuard event load generator")]
struct Args {
    /// Base URL of a running server
    #[arg(long)]
    url: Option<String>,

    /// How many events to generate
    #[arg(short = 'n', long, default_value_t = 20)]
    count: usize,

    /// How many verifications to keep in flight
    #[arg(short, long, default_value_t = 1)]
    parallel: usize,

    /// Seed for reproducible generation
    #[arg(long)]
    seed: Option<u64>,

    /// Dump generated events to a JSON-lines file
    #[arg(long)]
    dump: Option<PathBuf>,
}

/// Synthetic content corpus shared by every generated event.
struct Corpus {
    /// hash -> raw content, for escalating unknown verdicts
    filesystem: HashMap<String, Vec<u8>>,
    programs: Vec<ProcessObservation>,
    files: Vec<(String, String)>, // (hash, path)
}

fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

fn random_string(rng: &mut StdRng, chars: &[char], min: usize, max: usize) -> String {
    let len = rng.gen_range(min..=max);
    (0..len).map(|_| chars[rng.gen_range(0..chars.len())]).collect()
}

fn random_path(rng: &mut StdRng) -> String {
    let subdir_chars: Vec<char> = ('a'..='z').chain('0'..='9').collect();
    let file_chars: Vec<char> = ('a'..='z')
        .chain('A'..='Z')
        .chain('0'..='9')
        .chain([' ', '.', '+', '-', '_'])
        .collect();

    let mut components = vec![
        ROOT_DIRS[rng.gen_range(0..ROOT_DIRS.len())].to_string(),
        VENDOR_DIRS[rng.gen_range(0..VENDOR_DIRS.len())].to_string(),
    ];
    for _ in 0..rng.gen_range(1..=3) {
        components.push(random_string(rng, &subdir_chars, 2, 7));
    }

    let mut filename = random_string(rng, &file_chars, 3, 10);
    if rng.gen_range(0..4) > 0 {
        filename.push('.');
        filename.push_str(EXTENSIONS[rng.gen_range(0..EXTENSIONS.len())]);
    }
    components.push(filename);

    format!("/{}", components.join("/"))
}

fn random_content(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.gen_range(160..=262_144);
    let mut content = vec![0u8; len];
    rng.fill_bytes(&mut content);
    content
}

fn build_corpus(rng: &mut StdRng, count: usize) -> Corpus {
    let num_programs = rng.gen_range(2..=(count / 2).clamp(2, 25));
    let num_files = rng.gen_range((count / 7).max(1)..=(count / 3).max(1));
    println!("corpus: {} programs, {} files", num_programs, num_files);

    let mut filesystem = HashMap::new();

    let programs = (0..num_programs)
        .map(|_| {
            let content = random_content(rng);
            let hash = sha256_hex(&content);
            filesystem.insert(hash.clone(), content);
            ProcessObservation {
                hash,
                path: random_path(rng),
                pid: rng.gen_range(800..140_000),
            }
        })
        .collect();

    let files = (0..num_files)
        .map(|_| {
            let content = random_content(rng);
            let hash = sha256_hex(&content);
            filesystem.insert(hash.clone(), content);
            (hash, random_path(rng))
        })
        .collect();

    Corpus {
        filesystem,
        programs,
        files,
    }
}

fn build_events(rng: &mut StdRng, corpus: &Corpus, count: usize) -> Vec<Event> {
    let device = Device {
        id: uuid::Uuid::from_u128(rng.gen()).to_string(),
        os: "linux".to_string(),
    };

    let base_time: i64 = 1_700_000_000_000;
    let mut current_time = base_time + rng.gen_range(0..86_400_000);

    (0..count)
        .map(|_| {
            current_time += rng.gen_range(0..30_000);
            let (file_hash, file_path) = &corpus.files[rng.gen_range(0..corpus.files.len())];
            let program = &corpus.programs[rng.gen_range(0..corpus.programs.len())];

            Event {
                device: device.clone(),
                file: FileObservation {
                    hash: file_hash.clone(),
                    path: file_path.clone(),
                    time: FileTimes {
                        accessed: current_time,
                        modified: rng.gen_range(base_time..=current_time),
                    },
                },
                process: program.clone(),
            }
        })
        .collect()
}

async fn post_event(
    client: &reqwest::Client,
    base: &str,
    event: &Event,
) -> anyhow::Result<EventsResponse> {
    let response = client
        .post(format!("{}/api/v1/events", base))
        .json(event)
        .send()
        .await
        .context("event request failed")?
        .error_for_status()
        .context("event request rejected")?;

    response.json().await.context("invalid events response")
}

async fn upload_scan(
    client: &reqwest::Client,
    base: &str,
    content: &[u8],
) -> anyhow::Result<VerdictRecord> {
    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(content.to_vec()));

    let response = client
        .post(format!("{}/api/v1/scan", base))
        .multipart(form)
        .send()
        .await
        .context("scan request failed")?
        .error_for_status()
        .context("scan request rejected")?;

    response.json().await.context("invalid scan response")
}

/// Resolve one event, escalate every unknown hash, then re-resolve and
/// check that the stored verdicts are observed.
async fn verify_event(
    client: reqwest::Client,
    base: String,
    event: Event,
    filesystem: Arc<HashMap<String, Vec<u8>>>,
) -> anyhow::Result<()> {
    let first = post_event(&client, &base, &event).await?;
    println!(
        "event {} -> file {}, process {}",
        event.file.hash, first.file.risk_level, first.process.risk_level
    );

    let mut expected: HashMap<String, i32> = HashMap::new();
    for verdict in [&first.file, &first.process] {
        let level = if verdict.risk_level == RISK_UNKNOWN {
            let content = filesystem
                .get(&verdict.hash)
                .with_context(|| format!("no content on hand for hash {}", verdict.hash))?;
            let scanned = upload_scan(&client, &base, content).await?;
            println!("\tscan {} -> {}", scanned.hash, scanned.risk_level);
            ensure!(
                scanned.hash == verdict.hash,
                "hash mismatch: uploaded content hashing to {}, oracle returned {}",
                verdict.hash,
                scanned.hash
            );
            scanned.risk_level
        } else {
            verdict.risk_level
        };
        expected.insert(verdict.hash.clone(), level);
    }

    let second = post_event(&client, &base, &event).await?;
    for verdict in [&second.file, &second.process] {
        let want = expected
            .get(&verdict.hash)
            .copied()
            .with_context(|| format!("hash {} missing from re-resolution", verdict.hash))?;
        ensure!(
            verdict.risk_level == want,
            "verdict for {} was not persisted: expected {}, got {}",
            verdict.hash,
            want,
            verdict.risk_level
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.url.is_none() && args.dump.is_none() {
        bail!("either --url or --dump is required");
    }
    if args.count == 0 {
        bail!("count must be positive");
    }
    if args.parallel == 0 {
        bail!("parallel must be positive");
    }

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    println!("random seed is: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let corpus = build_corpus(&mut rng, args.count);
    let events = build_events(&mut rng, &corpus, args.count);

    if let Some(path) = &args.dump {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        for event in &events {
            writeln!(file, "{}", serde_json::to_string(event)?)?;
        }
        println!("dumped {} events to {}", events.len(), path.display());
    }

    let Some(url) = args.url else {
        return Ok(());
    };
    let url = url.trim_end_matches('/').to_string();

    let client = reqwest::Client::new();
    let filesystem = Arc::new(corpus.filesystem);
    let mut pool = DispatchPool::new(args.parallel);

    let mut admission_failure = None;
    for event in events {
        let op = verify_event(client.clone(), url.clone(), event, filesystem.clone());
        if let Err(e) = pool.add_task(op).await {
            admission_failure = Some(e);
            break;
        }
    }

    // Let whatever is still in flight finish before reporting.
    let drain_result = pool.drain().await;
    if let Some(e) = admission_failure {
        return Err(e.into());
    }
    drain_result?;

    println!("all {} events verified", args.count);
    Ok(())
}
