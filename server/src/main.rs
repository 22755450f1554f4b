use std::{net::IpAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use board::{Board, DragOutcome, DropTarget, StageGrouping, SummaryPeriod};
use board_client::GraphqlGateway;
use board_server::{
    config::AppConfig,
    graphql::{self, OpportunityStore, demo_opportunities},
    http::{self, AppState, ServeConfig},
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use entity::{DealId, Stage};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "board-server", version, about = "Deals pipeline board")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the in-memory opportunity API.
    Serve(ServeCommand),
    /// Fetch the board and print its columns and totals.
    Show(ShowCommand),
    /// Move a deal to another stage and wait for the write to settle.
    Move {
        deal_id: String,
        stage: Stage,
    },
    /// Print the GraphQL schema of the opportunity API.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Reject every stage update")]
    fail_updates: bool,
}

#[derive(Args, Debug)]
struct ShowCommand {
    /// Only count deals expected to close on or after this date.
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    /// Only count deals expected to close on or before this date.
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env("board-server"))?;
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Show(cmd) => show_board(cmd, &config).await,
        Command::Move { deal_id, stage } => move_deal(DealId::new(deal_id), stage, &config).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let mut store = OpportunityStore::new(demo_opportunities());
    if cmd.fail_updates {
        store = store.rejecting_updates();
    }
    let store = Arc::new(store);
    let state = AppState {
        schema: graphql::build_schema(Arc::clone(&store)),
        store,
        cors_allowed_origins: config.cors_allowed_origins,
    };
    http::serve(ServeConfig::from(&cmd), state).await
}

async fn open_board(config: &AppConfig) -> Result<Board<GraphqlGateway>> {
    let gateway = GraphqlGateway::new(config.client_config())?;
    let mut board = Board::new(Arc::new(gateway), config.sync_policy());
    board
        .refresh()
        .await
        .with_context(|| format!("could not load deals from {}", config.api_url))?;
    Ok(board)
}

async fn show_board(cmd: ShowCommand, config: &AppConfig) -> Result<()> {
    let board = open_board(config).await?;
    let period = match (cmd.from, cmd.to) {
        (Some(from), Some(to)) => Some(SummaryPeriod { from, to }),
        _ => None,
    };
    if let Some(grouping) = board.grouping() {
        print_columns(&grouping);
    }
    let summary = board.summary(period.as_ref());
    println!();
    println!("active deals     {}", summary.active_count);
    println!("active value     {:.2}", summary.active_value);
    println!("weighted value   {:.2}", summary.weighted_value);
    println!("won value        {:.2}", summary.won_value);
    Ok(())
}

fn print_columns(grouping: &StageGrouping) {
    for (stage, deals) in grouping.columns() {
        let total: f64 = deals.iter().map(|d| d.value).sum();
        println!("{} ({}, {:.2})", stage.label(), deals.len(), total);
        for deal in deals {
            println!(
                "  {:<10} {:<32} {:>12.2} {:>3}%  {}",
                deal.id, deal.name, deal.value, deal.probability, deal.account_name
            );
        }
    }
}

async fn move_deal(id: DealId, stage: Stage, config: &AppConfig) -> Result<()> {
    let mut board = open_board(config).await?;
    board.on_drag_start(id.clone());
    let outcome = board.on_drag_end(&id, Some(&DropTarget::Stage(stage)));
    match &outcome {
        DragOutcome::Moved { from, to, .. } => info!(deal_id = %id, %from, %to, "move submitted"),
        DragOutcome::Ignored => anyhow::bail!("deal {id} is not on the board"),
        other => {
            println!("nothing to commit: {other:?}");
            return Ok(());
        }
    }
    board.settle().await?;
    let notices = board.take_notices();
    for notice in &notices {
        println!("{}", serde_json::to_string(notice)?);
    }
    if let Some(state) = board.sync_state(&id) {
        println!("{id}: {}", serde_json::to_string(state)?);
    }
    if let Some(deal) = board.deals().get(&id) {
        println!("{id} is now in {} ({}%)", deal.stage.label(), deal.probability);
    }
    if notices.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("stage change for {id} was rolled back")
    }
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let schema = graphql::build_schema(Arc::new(OpportunityStore::default()));
    let sdl = schema.sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            info!(path = %target.display(), "schema written");
        }
        None => print!("{sdl}"),
    }
    Ok(())
}
