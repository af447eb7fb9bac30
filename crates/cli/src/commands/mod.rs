mod connect;
mod playback;
mod run;

use anyhow::Result;
use restbreak_core::Config;
use restbreak_core::browser::PlaybackAction;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let mut config = Config::load_or_default(cli.config.as_deref())?;
	if let Some(port) = cli.port {
		config.debug_port = port;
	}

	match cli.command {
		Commands::Run { work, rest } => {
			if let Some(minutes) = work {
				config.work_seconds = minutes * 60;
			}
			if let Some(seconds) = rest {
				config.rest_seconds = seconds;
			}
			run::execute(config).await
		}
		Commands::Connect => connect::execute(config).await,
		Commands::Pause => playback::execute(config, PlaybackAction::Pause).await,
		Commands::Resume => playback::execute(config, PlaybackAction::Resume).await,
	}
}
