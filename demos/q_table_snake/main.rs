use std::{error::Error, iter, path::PathBuf, thread, time::Duration};

use clap::Parser;
use qsnake::{
    algo::{QTableAgent, QTableAgentConfig},
    gym::{snake::SnakeConfig, SnakeEnv},
    store::PolicyStore,
    viz,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Train a Q-table agent to play snake
#[derive(Parser, Debug)]
struct Args {
    /// Draw the field after every step
    #[arg(long)]
    display: bool,
    /// Ignore any saved policy and start from an empty table
    #[arg(long)]
    retrain: bool,
    /// Number of episodes to run in this training session
    #[arg(long, default_value_t = 500)]
    num_episodes: u32,
    /// File the policy is loaded from and saved to
    #[arg(long, default_value = "q.json")]
    policy: PathBuf,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// Write per-episode metrics to a CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Steps per second while displaying
    #[arg(long, default_value_t = 50)]
    speed: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tui_logger::init_logger(log::LevelFilter::Debug)?;
    tui_logger::set_default_level(log::LevelFilter::Debug);

    let mut rng = match args.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut env = SnakeEnv::new(SnakeConfig::default())?;
    let mut agent: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());

    let store = PolicyStore::new(&args.policy);
    if !args.retrain {
        if let Some(policy) = store.load_or_fresh()? {
            agent.restore(policy)?;
        }
    }

    let mut wtr = args.csv.as_ref().map(csv::Writer::from_path).transpose()?;
    if let Some(wtr) = wtr.as_mut() {
        wtr.write_record(iter::once("episode").chain(env.report.keys().iter().copied()))?;
    }

    let (handle, tx) = viz::init(env.report.keys(), args.num_episodes);
    let frame_time = Duration::from_millis(1000 / args.speed.max(1));

    for i in 0..args.num_episodes {
        agent.go_with(&mut env, &mut rng, |env| {
            if args.display {
                let _ = tx.send(viz::Update::Board(env.into()));
                thread::sleep(frame_time);
            }
        })?;

        let data = env.report.take();
        if let Some(wtr) = wtr.as_mut() {
            wtr.write_record(iter::once(i.to_string()).chain(data.iter().map(f64::to_string)))?;
        }
        if tx.send(viz::Update::Episode { episode: i, data }).is_err() {
            log::info!("dashboard closed after {} episodes", i + 1);
            break;
        }
    }

    store.save(&agent.policy())?;
    if let Some(mut wtr) = wtr {
        wtr.flush()?;
    }

    drop(tx);
    handle.join().map_err(|_| "dashboard thread panicked")??;
    Ok(())
}
