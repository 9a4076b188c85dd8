use clap::Parser;

use inbox_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	inbox_worker::run(Args::parse()).await
}
