use clap::Parser;

use orkl_mcp_runtime::{McpCommands, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "orkl-mcp",
    version,
    about = "ORKL MCP server — threat intelligence catalog tools over stdio"
)]
struct Cli {
    /// ORKL API base URL
    #[arg(long, env = "ORKL_API_URL", default_value = "https://orkl.eu/api/v1")]
    api_url: String,

    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = run_mcp(&cli.api_url, cli.command).await;
    std::process::exit(code);
}
