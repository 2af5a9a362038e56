//! `penmark`: serve a blog from a theme directory and a JSON data file
//!
//! ```bash
//! penmark --config penmark.toml --data blog.json serve
//! penmark --data blog.json check
//! penmark --data blog.json render /post/hello
//! ```

use clap::{Parser, Subcommand};
use penmark_conf::Settings;
use penmark_exception::{Error, Result};
use penmark_server::{
	HttpServer, JsonDataProvider, build_dispatcher, check_templates, init_logging, shutdown_signal,
};
use penmark_urls::Request;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "penmark")]
#[command(about = "Blog front-end renderer", long_about = None)]
#[command(version)]
struct Cli {
	/// TOML settings file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// JSON file with posts, categories and comments
	#[arg(short, long, value_name = "PATH", default_value = "blog.json")]
	data: PathBuf,

	/// Address to listen on (overrides the `listen` setting)
	#[arg(short, long, value_name = "ADDR")]
	listen: Option<String>,

	/// Verbose logging and detailed error pages
	#[arg(long)]
	debug: bool,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
	/// Run the HTTP server (default)
	Serve,

	/// Compile every theme template and report errors
	Check,

	/// Dispatch one request path and print the response body
	Render {
		/// Request path, e.g. `/post/hello` or `/?post/hello`
		#[arg(value_name = "PATH")]
		path: String,
	},
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logging(cli.debug);
	match run(cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			tracing::error!(error = %err, "penmark failed");
			ExitCode::FAILURE
		}
	}
}

fn run(cli: Cli) -> Result<()> {
	let mut settings = Settings::load(cli.config.as_deref())?;
	if let Some(listen) = &cli.listen {
		settings.set("listen", Value::from(listen.as_str()));
	}
	if cli.debug {
		settings.set("debug", Value::Bool(true));
	}
	let listen = settings.blog()?.listen;

	let provider = Arc::new(JsonDataProvider::load(&cli.data)?);
	let dispatcher = build_dispatcher(settings, provider)?;

	match cli.command.unwrap_or(Command::Serve) {
		Command::Serve => {
			let addr: SocketAddr = listen
				.parse()
				.map_err(|e| Error::Config(format!("invalid listen address '{listen}': {e}")))?;
			let runtime = tokio::runtime::Runtime::new()?;
			runtime.block_on(async move {
				let listener = tokio::net::TcpListener::bind(addr).await?;
				HttpServer::new(dispatcher).serve(listener, shutdown_signal()).await
			})?;
		}
		Command::Check => {
			let names = check_templates(&dispatcher)?;
			println!("{} templates compiled", names.len());
		}
		Command::Render { path } => {
			let uri = path
				.parse()
				.map_err(|e| Error::Config(format!("invalid request path '{path}': {e}")))?;
			let response = dispatcher.dispatch(&Request::get(uri));
			tracing::info!(status = response.status.as_u16(), "rendered");
			println!("{}", response.text());
		}
	}
	Ok(())
}
