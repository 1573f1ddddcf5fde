use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voicewrite_agent::{Dispatcher, McpServer};
use voicewrite_core::{Config, Paths};
use voicewrite_tools::browser::{ChromeLauncher, LaunchOptions};

#[derive(Parser, Debug)]
#[command(name = "voicewrite")]
#[command(about = "Browser automation agent that narrates its actions, served over stdio JSON-RPC", long_about = None)]
#[command(version)]
struct Cli {
    /// Speak narration before actions
    #[arg(long, overrides_with = "no_voice")]
    voice: bool,

    /// Disable spoken narration
    #[arg(long, overrides_with = "voice")]
    no_voice: bool,

    /// Inject the speaking indicator into pages
    #[arg(long, overrides_with = "no_overlay")]
    overlay: bool,

    /// Do not inject the speaking indicator
    #[arg(long, overrides_with = "overlay")]
    no_overlay: bool,

    /// Narration mode: silent, minimal or full
    #[arg(long)]
    mode: Option<String>,

    /// Base URL of the speech synthesis service
    #[arg(long, value_name = "URL")]
    tts_url: Option<String>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Config file (default: ~/.voicewrite/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Wait for every narration to finish before acting
    #[arg(long)]
    await_narration: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if self.no_voice {
            config.voice = false;
        } else if self.voice {
            config.voice = true;
        }
        if self.no_overlay {
            config.overlay = false;
        } else if self.overlay {
            config.overlay = true;
        }
        if let Some(mode) = &self.mode {
            config.mode = mode.clone();
        }
        if let Some(url) = &self.tts_url {
            config.tts_url = url.clone();
        }
        config.headless |= self.headless;
        config.debug |= self.debug;
        config.await_all_narration |= self.await_narration;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = Paths::new();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&paths)?,
    };
    cli.apply(&mut config);

    // Stdout is the protocol channel; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if config.debug { "debug" } else { "info" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(filter)
        .init();

    info!(
        voice = config.voice,
        overlay = config.overlay,
        mode = %config.narration_mode(),
        tts_url = %config.tts_base(),
        headless = config.headless,
        "VoiceWrite starting"
    );
    if config.debug {
        info!("Effective config: {}", serde_json::to_string(&config)?);
    }

    let launcher = Arc::new(ChromeLauncher::new(LaunchOptions::from_config(
        &config, &paths,
    )));
    let dispatcher = Arc::new(Dispatcher::new(&config, launcher)?);
    let server = McpServer::new(dispatcher.clone());

    info!("VoiceWrite MCP agent running on stdio");
    tokio::select! {
        served = server.serve(tokio::io::stdin(), tokio::io::stdout()) => {
            if let Err(e) = served {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    dispatcher.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("voicewrite").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let mut config = Config::default();
        parse(&[]).apply(&mut config);
        assert!(config.voice);
        assert!(config.overlay);
        assert_eq!(config.mode, "full");
        assert!(!config.headless);
    }

    #[test]
    fn test_negative_flags() {
        let mut config = Config::default();
        parse(&["--no-voice", "--no-overlay", "--mode", "minimal", "--headless"]).apply(&mut config);
        assert!(!config.voice);
        assert!(!config.overlay);
        assert_eq!(config.mode, "minimal");
        assert!(config.headless);
    }

    #[test]
    fn test_last_voice_flag_wins() {
        let mut config = Config::default();
        parse(&["--no-voice", "--voice"]).apply(&mut config);
        assert!(config.voice);

        let mut config = Config {
            voice: true,
            ..Default::default()
        };
        parse(&["--voice", "--no-voice"]).apply(&mut config);
        assert!(!config.voice);
    }

    #[test]
    fn test_tts_url_and_await_flag() {
        let mut config = Config::default();
        parse(&["--tts-url", "http://tts.local:9000/", "--await-narration", "--debug"])
            .apply(&mut config);
        assert_eq!(config.tts_base(), "http://tts.local:9000");
        assert!(config.await_all_narration);
        assert!(config.debug);
    }
}
