use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use findareddit_common::Config;
use findareddit_scout::run_loop::RunLoop;
use findareddit_scout::traits::classify;
use reddit_client::{Credentials, RedditClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("findareddit=info".parse()?)
                .add_directive("reddit_client=info".parse()?),
        )
        .init();

    info!("Find-a-Reddit directory scout starting...");

    // Load config
    let config = Config::from_env().context("Failed to load configuration")?;
    config.log_redacted();

    let client = RedditClient::new(Credentials {
        client_id: config.reddit_client_id.clone(),
        client_secret: config.reddit_client_secret.clone(),
        username: config.reddit_username.clone(),
        password: config.reddit_password.clone(),
        user_agent: config.reddit_user_agent.clone(),
    })?;

    // Fail fast on bad credentials before entering the loop
    match client.me().await {
        Ok(me) => info!(user = %me.name, "Logged in"),
        Err(e) => {
            error!(error = %classify(e), "Error logging in, exiting");
            anyhow::bail!("could not log in as /u/{}", config.reddit_username);
        }
    }

    let result = RunLoop::new(&client, &config).run().await;
    if let Err(ref e) = result {
        error!(error = %e, "Scout stopped");
    }
    Ok(result?)
}
