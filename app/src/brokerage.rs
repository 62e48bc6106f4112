// In app/src/brokerage.rs

use anyhow::Result;
use api_client::{ApiClient, TokenStatus};
use app_config::BrokerageSettings;
use chrono::Utc;
use screening::{AnswerSource, ConsolePrompt};

/// Builds the brokerage client and makes sure it holds a usable access token,
/// renewing an aging one or running the interactive authorization flow.
pub async fn connect(settings: &BrokerageSettings) -> Result<ApiClient> {
    let mut client = ApiClient::new(settings)?;

    match client.token_status(Utc::now().timestamp()) {
        TokenStatus::Valid => tracing::debug!("Access token is valid."),
        TokenStatus::NeedsRenewal => {
            if let Err(e) = client.renew_token(false).await {
                tracing::warn!(error = %e, "Token renewal failed, authorizing again.");
                authorize(&mut client).await?;
            }
        }
        TokenStatus::Missing | TokenStatus::Expired => {
            tracing::info!("No valid access token, starting authorization.");
            authorize(&mut client).await?;
        }
    }

    Ok(client)
}

/// Request token, user verification, access token.
pub async fn authorize(client: &mut ApiClient) -> Result<()> {
    let pending = client.request_authorization().await?;

    let mut prompt = ConsolePrompt;
    prompt.show(&format!(
        "\nAuthorize this application in your browser:\n\n\t{}\n",
        pending.authorize_url
    ));
    let verifier = prompt.ask("Enter the verification code: ")?;
    if verifier.trim().is_empty() {
        anyhow::bail!("No verification code entered.");
    }

    client.complete_authorization(&pending, &verifier).await?;
    Ok(())
}
