//! # Counterpoint Studio Daemon
//!
//! Main entry point for the studio daemon.

use counterpointd::{run_generator_worker, Studio, StudioConfig};
use std::env;
use std::io;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });

    if config.generator_worker {
        if let Err(e) = run_generator_worker() {
            eprintln!("Generator worker error: {}", e);
            process::exit(1);
        }
        return;
    }

    let mut studio = Studio::start(config).unwrap_or_else(|e| {
        eprintln!("Failed to start studio: {}", e);
        process::exit(1);
    });

    println!("Watching {} - press ENTER to quit", studio.score().display());

    let (quit_tx, quit_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        let _ = quit_tx.send(());
    });

    if let Err(e) = studio.run(quit_rx) {
        eprintln!("Studio error: {}", e);
        process::exit(1);
    }

    if let Err(e) = studio.shutdown() {
        eprintln!("Shutdown error: {}", e);
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<StudioConfig, String> {
    let mut config = StudioConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--score" | "-s" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --score".to_string());
                }
                config.score = PathBuf::from(&args[i]);
            }
            "--model-dir" | "-m" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --model-dir".to_string());
                }
                config.model_dir = PathBuf::from(&args[i]);
            }
            "--poll-ms" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --poll-ms".to_string());
                }
                let millis: u64 = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid poll-ms value: {}", args[i]))?;
                config.poll = Duration::from_millis(millis);
            }
            "--batch" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --batch".to_string());
                }
                config.batch = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid batch value: {}", args[i]))?;
            }
            "--worker-cmd" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --worker-cmd".to_string());
                }
                config.worker_cmd = Some(PathBuf::from(&args[i]));
            }
            "--generator-worker" => {
                config.generator_worker = true;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --score <FILE>       Score file to watch (default: score.mid)");
    eprintln!("  -m, --model-dir <DIR>    Model directory (default: model)");
    eprintln!("  --poll-ms <N>            Watcher poll interval in milliseconds");
    eprintln!("  --batch <N>              Variations generated per change (default: 2)");
    eprintln!("  --worker-cmd <BIN>       Generator worker binary (default: this binary)");
    eprintln!("  --generator-worker       Run as the generator worker subprocess");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!(
        "  {} --score sketches/menuet.mid --model-dir models/bach",
        program
    );
    eprintln!("  {} --poll-ms 100 --batch 4", program);
}
