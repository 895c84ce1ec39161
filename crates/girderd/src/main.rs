use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::process::ExitCode;

use girder_config::RuntimeConfig;
use girderd::{Session, SessionOutcome, ShutdownFlag, telemetry};
use serde_json::json;
use tracing::{error, info};

fn main() -> ExitCode {
    let config = match RuntimeConfig::load() {
        Ok(config) => config,
        Err(load_error) => {
            eprintln!("Failed to load configuration: {load_error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(telemetry_error) = telemetry::initialise(&config) {
        eprintln!("Failed to initialise telemetry: {telemetry_error}");
        return ExitCode::FAILURE;
    }
    let shutdown = match ShutdownFlag::install() {
        Ok(flag) => flag,
        Err(install_error) => {
            error!(error = %install_error, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    // The session owns standard input for its whole lifetime; stdout
    // carries only protocol frames.
    let input = unsafe { OwnedFd::from_raw_fd(io::stdin().as_raw_fd()) };
    let mut session = Session::new(&config, input, io::stdout(), shutdown);

    // Minimal handshake; applications embedding the scaffold register a
    // richer handler over this one.
    session.add_request_handler("initialize", |_params| {
        Ok(json!({
            "capabilities": {
                "textDocumentSync": {"openClose": true, "change": 2},
            },
            "serverInfo": {
                "name": "girderd",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))
    });
    session.set_diagnostics_provider(|_uri, _document| Vec::new());

    info!("session starting");
    match session.run() {
        Ok(SessionOutcome::CleanShutdown) => ExitCode::SUCCESS,
        Ok(SessionOutcome::StreamFailure) => ExitCode::FAILURE,
        Err(session_error) => {
            error!(error = %session_error, "failed to start session");
            ExitCode::FAILURE
        }
    }
}
