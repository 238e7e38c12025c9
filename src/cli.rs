//! Command-line interface.

use anyhow::Result;
use clap::Parser;

use rallypoint_audio::{DictationConfig, ReadbackConfig};
use rallypoint_channels::{PollingConfig, RealtimeConfig};

use crate::console;

/// Rallypoint coordination chat console
#[derive(Debug, Parser)]
#[command(name = "rallypoint", version, about)]
pub struct Cli {
    /// Responder identifier to connect as
    #[arg(short, long)]
    pub user: String,

    /// Real-time chat endpoint
    #[arg(long, default_value = "ws://localhost:8000/chat/ws")]
    pub ws_url: String,

    /// Legacy chat backend base URL
    #[arg(long, default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Group ids served by the legacy polling backend
    #[arg(long = "legacy-group")]
    pub legacy_groups: Vec<String>,

    /// Dictation/read-back language (BCP-47)
    #[arg(long, default_value = "en-US")]
    pub language: String,

    /// Speak incoming messages aloud
    #[arg(long)]
    pub read_aloud: bool,
}

impl Cli {
    /// Real-time channel settings from the flags.
    #[must_use]
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig::default().with_endpoint(self.ws_url.clone())
    }

    /// Polling channel settings from the flags.
    #[must_use]
    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig::default().with_base_url(self.api_url.clone())
    }

    /// Dictation settings from the flags.
    #[must_use]
    pub fn dictation_config(&self) -> DictationConfig {
        DictationConfig::default().with_language(self.language.clone())
    }

    /// Read-back settings from the flags.
    #[must_use]
    pub fn readback_config(&self) -> ReadbackConfig {
        let mut config = ReadbackConfig::default();
        config.enabled = self.read_aloud;
        config.language = self.language.clone();
        config
    }
}

/// Run the console.
pub async fn run(cli: Cli) -> Result<()> {
    console::run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_to_configs() {
        let cli = Cli::parse_from([
            "rallypoint",
            "--user",
            "cmdr-1",
            "--ws-url",
            "ws://ops.example.org/chat/ws",
            "--legacy-group",
            "east-shelter",
            "--read-aloud",
        ]);
        assert_eq!(cli.realtime_config().endpoint, "ws://ops.example.org/chat/ws");
        assert_eq!(cli.legacy_groups, vec!["east-shelter"]);
        assert!(cli.readback_config().enabled);
        assert_eq!(cli.dictation_config().language, "en-US");
    }
}
