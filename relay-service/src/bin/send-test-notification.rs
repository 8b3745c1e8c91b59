//! Send one notification straight to a device token through FCM, bypassing
//! the recipient lookup. Useful for checking credentials and a device
//! registration end to end.

use clap::Parser;
use relay_service::config::{is_prod, FcmConfig};
use relay_service::models::PushMessage;
use relay_service::services::{FcmProvider, PushProvider};
use service_core::observability::init_tracing;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(about = "Send a test push notification via FCM")]
struct Args {
    /// Device registration token to target
    #[arg(long, env = "FCM_TEST_TOKEN")]
    token: String,

    #[arg(long, default_value = "Test Notification")]
    title: String,

    #[arg(long, default_value = "Hello from local test!")]
    body: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_tracing("send-test-notification", "info", None) {
        eprintln!("{}", e);
    }

    match send(args).await {
        Ok(name) => {
            tracing::info!(message_name = ?name, "Successfully sent notification");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Error sending notification");
            ExitCode::FAILURE
        }
    }
}

async fn send(args: Args) -> anyhow::Result<Option<String>> {
    let config = FcmConfig::from_env(is_prod())?;
    let provider = FcmProvider::from_config(&config)?;

    let message = PushMessage {
        token: args.token,
        title: args.title,
        body: args.body,
        data: None,
    };

    tracing::info!(project_id = %provider.project_id(), "Sending test notification...");
    let response = provider.send(&message).await?;
    Ok(response.provider_id)
}
