use std::sync::Arc;
use backend::{
    config::Config,
    postgres::PgStore,
    store::ElectionStore,
    watcher::TallyWatcher,
    Tally,
};
use time::OffsetDateTime;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

fn log_tally(tally: &Tally) {
    for position in &tally.positions {
        let leaders: Vec<_> = position.leaders().map(|c| c.name.as_str()).collect();
        info!(
            position = %position.position,
            votes = position.total_votes(),
            leaders = ?leaders,
            "Standings"
        );
        for row in &position.rows {
            info!(
                "  {:<24} {:>4}{}{}",
                row.candidate.name,
                row.votes,
                if row.is_leader { "  Leading" } else { "" },
                if row.is_user_choice { "  (Your Vote)" } else { "" },
            );
        }
    }
    if tally.excluded > 0 {
        info!(excluded = tally.excluded, "Votes for removed candidates were not counted");
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PgStore::connect(&config.database_url, config.max_connections).await?);
    store.migrate().await?;

    match store.election(config.election_id).await? {
        Some(election) => {
            let status = if election.is_open_at(OffsetDateTime::now_utc()) { "open" } else { "closed" };
            info!(election_id = %election.id, title = %election.title, status, "🗳️ Watching election");
        }
        None => info!(election_id = %config.election_id, "Election not created yet, waiting for candidates"),
    }

    let mut watcher = TallyWatcher::spawn(store, config.election_id, config.viewer_id).await?;
    log_tally(&watcher.current());

    loop {
        tokio::select! {
            next = watcher.next() => match next {
                Some(tally) => log_tally(&tally),
                None => return Err("change feeds ended, tally is no longer live".into()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    watcher.stop();
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting tally watcher");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config).await {
        error!("Tally watcher failed: {}", e);
        std::process::exit(1);
    }
}
