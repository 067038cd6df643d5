use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lsprpc_jsonrpc::{
    lsp, ClientConfig, Framing, HttpTransport, IdStyle, JsonRpcClient, JsonRpcTransport,
    ParamsStyle, StdioTransport, TcpTransport,
};
use serde_json::Value;
use std::process::exit;
use std::time::Duration;
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Globals {
    /// Host the language server is running on
    #[arg(long, env = "LSPRPC_HOST", default_value = lsprpc_jsonrpc::DEFAULT_HOST, global = true)]
    host: String,

    /// Port the language server is listening on
    #[arg(short, long, env = "LSPRPC_PORT", default_value_t = lsprpc_jsonrpc::DEFAULT_PORT, global = true)]
    port: u16,

    /// HTTP path of the JSON-RPC endpoint.  Ignored with `--tcp`.
    #[arg(long, env = "LSPRPC_PATH", default_value = "/", global = true)]
    path: String,

    /// Give up on a request after this many milliseconds
    #[arg(long, env = "LSPRPC_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    /// How request ids are generated
    #[arg(long, value_enum, default_value_t = CliIdStyle::Uuid, global = true)]
    id_style: CliIdStyle,

    /// How params are put on the wire
    #[arg(long, value_enum, default_value_t = CliParamsStyle::Positional, global = true)]
    params_style: CliParamsStyle,

    /// Connect over a raw TCP socket instead of HTTP
    #[arg(long, global = true, conflicts_with = "stdio")]
    tcp: bool,

    /// Spawn this command line (e.g. "ctags-lsp serve --std") and talk to it over its stdin and
    /// stdout instead of connecting over the network
    #[arg(long, value_name = "COMMAND", global = true)]
    stdio: Option<String>,

    /// Message framing to use with `--tcp` or `--stdio`
    #[arg(long, value_enum, default_value_t = CliFraming::ContentLength, global = true)]
    framing: CliFraming,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliIdStyle {
    Uuid,
    Sequential,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliParamsStyle {
    /// Wrap params in an array unless they already are one
    Positional,
    /// Send params as given
    ByName,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliFraming {
    /// One JSON message per line
    Lines,
    /// LSP `Content-Length` headers
    ContentLength,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform the LSP `initialize` handshake and print the server's answer
    Initialize {
        /// Process id reported to the server
        #[arg(long, default_value_t = 1)]
        process_id: u32,

        /// Workspace root reported to the server
        #[arg(long, default_value = "/")]
        root_path: String,
    },

    /// Invoke an arbitrary method and print its result
    Call {
        method: String,

        /// Params, as JSON
        params: Option<String>,
    },

    /// Send a notification.  Nothing is printed.
    Notify {
        method: String,

        /// Params, as JSON
        params: Option<String>,
    },
}

impl Globals {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            timeout: self.timeout_ms.map(Duration::from_millis),
            id_style: match self.id_style {
                CliIdStyle::Uuid => IdStyle::Uuid,
                CliIdStyle::Sequential => IdStyle::Sequential,
            },
            params_style: match self.params_style {
                CliParamsStyle::Positional => ParamsStyle::Positional,
                CliParamsStyle::ByName => ParamsStyle::ByName,
            },
        }
    }

    async fn connect(&self) -> anyhow::Result<JsonRpcClient<Box<dyn JsonRpcTransport>>> {
        let config = self.client_config();

        let framing = match self.framing {
            CliFraming::Lines => Framing::Lines,
            CliFraming::ContentLength => Framing::ContentLength,
        };

        let transport: Box<dyn JsonRpcTransport> = if let Some(command_line) = &self.stdio {
            let mut words = command_line.split_whitespace();
            let program = words.next().context("--stdio needs a command to run")?;
            let mut command = tokio::process::Command::new(program);
            command.args(words);

            let transport = StdioTransport::spawn(&mut command, framing)
                .with_context(|| format!("Failed to start '{}'", command_line))?;
            info!(command = %command_line, ?framing, "Spawned server");

            let transport = match config.timeout {
                Some(timeout) => transport.with_timeout(timeout),
                None => transport,
            };
            Box::new(transport)
        } else if self.tcp {
            let address = config.socket_address();
            let transport = TcpTransport::connect_tcp(address.as_str(), framing)
                .await
                .with_context(|| format!("Failed to connect to {}", address))?;
            info!(%address, ?framing, "Connected over TCP");

            let transport = match config.timeout {
                Some(timeout) => transport.with_timeout(timeout),
                None => transport,
            };
            Box::new(transport)
        } else {
            let transport = HttpTransport::from_config(&config)?;
            info!(endpoint = %transport.endpoint(), "Using HTTP transport");
            Box::new(transport)
        };

        Ok(JsonRpcClient::new(transport)
            .with_id_style(config.id_style)
            .with_params_style(config.params_style))
    }
}

impl Commands {
    async fn execute(self, globals: &Globals) -> anyhow::Result<()> {
        use Commands::*;

        let client = globals.connect().await?;

        match self {
            Initialize {
                process_id,
                root_path,
            } => {
                let params = lsp::InitializeParams {
                    process_id: Some(process_id),
                    root_path: Some(root_path),
                    ..Default::default()
                };
                // Printed as received, since servers answer with more than `InitializeResult` models
                let result = client.call(lsp::INITIALIZE, &params).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Call { method, params } => {
                let result = client.call(&method, parse_params(params)?).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Notify { method, params } => {
                client.notify(&method, parse_params(params)?).await?;
            }
        }

        Ok(())
    }
}

fn parse_params(params: Option<String>) -> anyhow::Result<Value> {
    match params {
        Some(params) => serde_json::from_str(&params)
            .with_context(|| format!("Params are not valid JSON: {}", params)),
        None => Ok(Value::Null),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Log to stderr so that stdout only ever carries the result
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    // The handshake with default params is the whole point of this tool, so it's also what runs
    // when no command is given
    let command = cli.command.unwrap_or(Commands::Initialize {
        process_id: 1,
        root_path: "/".to_string(),
    });

    if let Err(e) = command.execute(&cli.globals).await {
        error!("{:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}
