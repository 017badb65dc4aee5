mod cli;
mod config;
mod error;
mod log;
mod notes;

use std::thread;

use ::log::{error, info, warn};
use clap::Parser;
use notetaker_transcription::CancellationToken;

pub use cli::Cli;
pub use config::{
    AppConfig, ConfigError, ConfigOverrides, ConfigSource, EnvSource, NoPrompt, Prompter,
    Resolver, StdinPrompter,
};
pub use error::Error;
pub use notes::{
    generate_notes, take_notes, validate_audio_file, Notes, NotesError, SummaryBackend,
};

/// Parse arguments, resolve configuration and print notes for the given audio file.
pub fn run() -> Result<(), Error> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    log::init();

    let (audio_path, overrides, interactive) = Cli::parse().into_parts();

    let config = if interactive {
        Resolver::new(&EnvSource, &StdinPrompter).resolve_app_config(overrides)?
    } else {
        Resolver::new(&EnvSource, &NoPrompt).resolve_app_config(overrides)?
    };
    info!("Resolved configuration: {:?}", config);

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    eprintln!("Transcribing the audio with {}...", config.engine);
    let notes = generate_notes(&config, &audio_path, &cancel)?;
    println!("{}", notes.to_markdown());
    Ok(())
}

/// Cancel `token` when the process receives Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    let spawned = thread::Builder::new()
        .name("interrupt-handler".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start interrupt handler: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling");
                    token.cancel();
                }
            });
        });

    if let Err(e) = spawned {
        error!("Failed to spawn interrupt handler thread: {}", e);
    }
}
