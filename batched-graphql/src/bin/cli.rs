use batched_graphql::{init_logging, prelude::*};
use clap::Parser;
use color_eyre::eyre::WrapErr;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

/// Execute a GraphQL query against an in-memory data set.
#[derive(Clone, Debug, Parser)]
#[command(name = "batched-graphql")]
struct Options {
    /// JSON file to load the data set from.
    ///
    /// The file has a list for each of `users`, `posts`, `profiles`, `memberTypes` and
    /// `subscriptions`. If omitted, the data set contains only the standard member types.
    #[arg(long, env = "BATCHED_GRAPHQL_SEED")]
    seed: Option<PathBuf>,

    /// Query to execute. Read from stdin if neither this nor --sdl is given.
    #[arg(short, long)]
    query: Option<String>,

    /// Variables for the query, as a JSON object.
    #[arg(long)]
    variables: Option<String>,

    /// Name of the operation to execute, if the query contains more than one.
    #[arg(long)]
    operation_name: Option<String>,

    /// Print the schema instead of executing a query.
    #[arg(long)]
    sdl: bool,

    #[command(flatten)]
    config: Config,
}

#[async_std::main]
async fn main() -> color_eyre::Result<()> {
    init_logging();
    let opt = Options::parse();

    let store = match &opt.seed {
        Some(path) => {
            let json = async_std::fs::read_to_string(path)
                .await
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            MemoryStore::from_json(&json).wrap_err("parsing seed data")?
        }
        None => MemoryStore::with_member_types(),
    };
    let executor = Executor::new(Arc::new(store), &opt.config);

    if opt.sdl {
        println!("{}", executor.sdl());
        return Ok(());
    }

    let query = match opt.query {
        Some(query) => query,
        None => {
            let mut query = String::new();
            std::io::stdin().read_to_string(&mut query)?;
            query
        }
    };
    let mut request = QueryRequest::new(query);
    if let Some(variables) = &opt.variables {
        request = request.variables(serde_json::from_str(variables).wrap_err("parsing variables")?);
    }
    if let Some(name) = opt.operation_name {
        request = request.operation_name(name);
    }

    let response = executor.execute(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
