use anyhow::Result;
use shared::config::Config;
use shielded::{
    Amount, CancellationToken, Ed25519Signer, HistoryFilter, ProgressEvent, ProgressReporter,
    SimulatedProver, TxStatus, Wallet, WalletSettings, WalletState,
};
use std::sync::Arc;
use std::time::Duration;

fn settings_from(config: &Config) -> WalletSettings {
    WalletSettings {
        public_asset: config.wallet.public_asset.clone(),
        private_asset: config.wallet.private_asset.clone(),
        derivation_domain: config.wallet.derivation_domain.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    shared::logging::init_with_format(config.logging.format);
    tracing::info!("Starting shielded wallet session");

    let settings = settings_from(&config);
    let public_asset = settings.public_asset.clone();
    let private_asset = settings.private_asset.clone();

    // The external signing provider; a connected chain wallet in production
    let signer = Ed25519Signer::generate()?;
    let account = signer.account();

    let prover = SimulatedProver::new(
        config.prover.step_percent,
        Duration::from_millis(config.prover.step_delay_ms),
    )?;
    let state = WalletState::new(
        account.clone(),
        Amount::new(config.wallet.initial_public_balance)?,
        settings,
    );
    let wallet = Wallet::with_prover(state, Arc::new(prover));
    tracing::info!("Wallet created for account {}", account.address());

    // Ctrl-C abandons whatever operation is in flight
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling pending operation");
            on_signal.cancel();
        }
    });

    let (progress, mut events) = ProgressReporter::channel();
    let progress_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::Deriving { percent } | ProgressEvent::GeneratingProof { percent }
                    if percent % 25 != 0 =>
                {
                    tracing::debug!("Progress {}%", percent)
                }
                other => tracing::info!("Progress: {:?}", other),
            }
        }
    });

    // Setup privacy: one signature derives the key pair
    let privacy_address = wallet.activate_privacy(&signer, &progress, &cancel).await?;
    tracing::info!(
        "Privacy mode active at {}",
        privacy_address.display_for_asset(&private_asset)
    );

    // Shield part of the public balance
    let shield_amount =
        Amount::parse_for_asset(&format!("1.0 {}", public_asset), Some(&public_asset))?;
    let shield = wallet.shield(shield_amount, &progress, &cancel).await?;
    wallet.settle(shield.transaction.id(), TxStatus::Completed).await?;

    // Private send to a second wallet's privacy address
    let recipient_signer = Ed25519Signer::generate()?;
    let recipient = Wallet::new(
        recipient_signer.account(),
        Amount::ZERO,
        WalletSettings::default(),
    )
    .activate_privacy(&recipient_signer, &ProgressReporter::disabled(), &cancel)
    .await?;
    let send = wallet
        .private_send(Amount::parse("0.5")?, recipient, &progress, &cancel)
        .await?;
    tracing::info!(
        "Private send created {} note(s), revealed {} nullifier(s)",
        send.created_notes.len(),
        send.nullifiers.len()
    );

    // Unshield part of the change back to our own account
    wallet
        .unshield(Amount::parse("0.25")?, account.address(), &progress, &cancel)
        .await?;

    // Public transfer to another account
    wallet
        .transfer(
            Amount::parse("0.1")?,
            Ed25519Signer::generate()?.account().address(),
            &progress,
            &cancel,
        )
        .await?;

    drop(progress);
    progress_task.await?;

    let summary = wallet.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("Public history:\n{}", wallet.history_json(HistoryFilter::PublicView).await?);
    println!("Private history:\n{}", wallet.history_json(HistoryFilter::PrivateView).await?);

    tracing::info!("Session complete");
    Ok(())
}
