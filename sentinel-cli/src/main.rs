use sentinel_cli::{logging, signal, Cli};
use sentinel_core::{Interface, Result};
use sentinel_detect::Monitor;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // SLACK_TOKEN and SLACK_CHANNEL may come from a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    logging::init(cli.debug);

    if cli.list_interfaces {
        list_interfaces();
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(component = e.component(), error = %e, "dhcp-sentinel failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut termination = signal::listen();
    let config = cli.into_config()?;

    let Some(started) = signal::unless_terminated(Monitor::start(config), &mut termination).await
    else {
        info!("Termination signal received during startup");
        return Ok(());
    };
    let monitor = started?;

    let trigger = monitor.trigger();
    tokio::spawn(async move {
        if termination.await.is_ok() {
            info!("Termination signal received, shutting down");
            trigger.trigger();
        }
    });

    monitor.run().await
}

fn list_interfaces() {
    let interfaces = Interface::list_capture_capable();
    if interfaces.is_empty() {
        println!("No capture-capable interfaces found");
        return;
    }
    for iface in interfaces {
        println!("{}", iface);
    }
}
