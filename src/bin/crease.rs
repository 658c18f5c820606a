use std::env;
use std::error::Error;
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crease::data::{filter, read_csv, Predicate, Role};
use crease::fit::{fit_concurrently, Config, Estimator};
use crease::opt::{IrlsConfig, LbfgsConfig, Strategy};
use crease::print::{tabulate_auxiliary, tabulate_composites, tabulate_matchup};
use crease::stratum::StratumScheme;
use crease::synth::Scenario;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// ball-by-ball CSV to fit
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,

    /// fit synthetic deliveries generated from this seed
    #[clap(short = 's', long)]
    synthetic: Option<u64>,

    /// JSON configuration; flags below override it
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// minimum balls faced for a batter to be rated
    #[clap(long, default_value = "0")]
    min_balls_faced: u64,

    /// minimum balls bowled for a bowler to be rated
    #[clap(long, default_value = "0")]
    min_balls_bowled: u64,

    /// stratify the order effect: none, phase or venue
    #[clap(long)]
    scheme: Option<String>,

    /// optimiser: irls or lbfgs
    #[clap(long)]
    strategy: Option<String>,

    /// rows to print per table
    #[clap(short = 't', long, default_value = "20")]
    top: usize,

    /// predict a specific pairing, given as batter,bowler
    #[clap(short = 'm', long)]
    matchup: Option<String>,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.file.is_none() && self.synthetic.is_none() || self.file.is_some() && self.synthetic.is_some() {
            bail!("either the -f or the -s flag must be specified");
        }
        if self.top == 0 {
            bail!("at least one row must be printed");
        }
        if let Some(matchup) = &self.matchup {
            if matchup.split_once(',').is_none() {
                bail!("matchup must be given as batter,bowler");
            }
        }
        Ok(())
    }

    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            None => Config::default(),
            Some(path) => Config::load(path)?,
        };
        if let Some(scheme) = &self.scheme {
            config.stratum_scheme = match scheme.as_str() {
                "none" => StratumScheme::None,
                "phase" => StratumScheme::ten_over_phases(),
                "venue" => StratumScheme::Venue,
                other => bail!("unsupported stratum scheme '{other}'"),
            };
        }
        if let Some(strategy) = &self.strategy {
            config.strategy = match strategy.as_str() {
                "irls" => Strategy::Irls(IrlsConfig::default()),
                "lbfgs" => Strategy::BoundedLbfgs(LbfgsConfig::default()),
                other => bail!("unsupported strategy '{other}'"),
            };
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let estimator = Estimator::try_from(args.config()?)?;
    debug!("config: {:?}", estimator.config());

    let deliveries = match &args.file {
        Some(file) => {
            let deliveries = read_csv(file)?;
            info!("read {} deliveries from {file:?}", deliveries.len());
            deliveries
        }
        None => Scenario {
            seed: args.synthetic.unwrap_or_default(),
            ..Scenario::default()
        }
        .generate()
        .deliveries,
    };
    let mut predicates = vec![Predicate::NoExtras, Predicate::BowlerCredited];
    if args.min_balls_faced > 0 {
        predicates.push(Predicate::MinBallsFaced(args.min_balls_faced));
    }
    if args.min_balls_bowled > 0 {
        predicates.push(Predicate::MinBallsBowled(args.min_balls_bowled));
    }
    let deliveries = filter(deliveries, &predicates);
    info!("{} deliveries eligible", deliveries.len());

    let ratings = fit_concurrently(&estimator, &deliveries).await?;
    if ratings.excluded > 0 {
        info!("{} deliveries excluded from the runs model", ratings.excluded);
    }
    for (name, fit) in [("wicket", &ratings.wicket), ("runs", &ratings.runs)] {
        info!(
            "{name} model: log-likelihood {:.4} after {} iterations of {} ({:?})",
            fit.diagnostics.log_likelihood, fit.diagnostics.iterations, fit.diagnostics.strategy, fit.diagnostics.elapsed
        );
        info!("{name} auxiliary parameters:\n{}", Console::default().render(&tabulate_auxiliary(fit)));
    }
    for role in Role::iter() {
        let table = tabulate_composites(ratings.scores.by_role(role), args.top);
        info!("{role} ratings:\n{}", Console::default().render(&table));
    }

    if let Some((batter, bowler)) = args.matchup.as_ref().and_then(|matchup| matchup.split_once(',')) {
        if let Some(matchup) = ratings.matchup(batter.trim(), bowler.trim(), 0) {
            info!("matchup:\n{}", Console::default().render(&tabulate_matchup(&matchup)));
        }
    }
    Ok(())
}
