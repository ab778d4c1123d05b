mod command;
mod config;
mod llm;

use tokio_util::sync::CancellationToken;

use crate::config::{Command, cli_args, cli_config};

async fn app(cancel: CancellationToken) -> anyhow::Result<()> {
  logger::init(&cli_config().logging)?;

  let args = cli_args();
  match &args.command {
    Command::Plan(deploy_args) => command::plan::handle(deploy_args, &cancel).await,
    Command::Apply(deploy_args) => command::apply::handle(deploy_args, &cancel).await,
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let cancel = CancellationToken::new();
  let handle = tokio::spawn(app(cancel.clone()));

  let interrupt_cancel = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("received interrupt, cancelling in-flight work");
      interrupt_cancel.cancel();
    }
  });

  // Always awaited, even on interrupt, so in-flight subprocess children
  // get a chance to observe the cancellation token and exit cleanly
  // before the runtime shuts down.
  handle.await?
}
