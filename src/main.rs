//! mongoquery - run MongoDB shell-syntax statements
//!
//! Reads statements from a script file, `--eval` or stdin, runs each one
//! independently and prints one JSON report per statement.
//!
//! # Usage
//!
//! ```bash
//! # Run a script
//! mongoquery --uri mongodb://localhost:27017/shop queries.js
//!
//! # Show descriptors only
//! mongoquery --parse-only -e 'db.users.find({age: {$gt: 18}}).limit(5)'
//! ```

use tracing::Level;

use mongoquery::cli::CliInterface;
use mongoquery::connection::ConnectionManager;
use mongoquery::error::Result;
use mongoquery::executor::{self, MongoExecutor, ScriptRunner, StatementReport};
use mongoquery::formatter::Formatter;

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the statements
///
/// # Returns
/// * `Result<bool>` - Whether every statement succeeded
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(true);
    }

    let script = cli.read_script()?;

    let reports = if cli.args().parse_only {
        executor::parse_only(&script)
    } else {
        execute_script(&cli, &script).await?
    };

    display_reports(&cli, &reports)?;
    Ok(executor::all_succeeded(&reports))
}

/// Connect, run every statement and disconnect
async fn execute_script(cli: &CliInterface, script: &str) -> Result<Vec<StatementReport>> {
    let uri = cli.get_connection_uri();
    let mut conn_manager = ConnectionManager::new(uri, cli.config().connection.clone());
    conn_manager.connect().await?;
    conn_manager.set_database(cli.get_database());

    let executor = MongoExecutor::new(conn_manager);
    let reports = ScriptRunner::new(&executor).run(script).await;
    executor.shutdown().await?;

    Ok(reports)
}

/// Print reports to stdout with the configured format
fn display_reports(cli: &CliInterface, reports: &[StatementReport]) -> Result<()> {
    let formatter = Formatter::from_config(&cli.config().display);
    let output = formatter.format_reports(reports)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so stdout carries only results.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
