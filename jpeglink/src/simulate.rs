//! `jpeglink simulate`: one full session against the simulated peripheral.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{info, warn};

use jpeglink_core::error::LinkError;
use jpeglink_core::{
    ConnectionState, LinkEngine, ObserverEvent, SimPeripheral, TransferOutcome, engine_channel,
};

use crate::config::CliConfig;

/// Run discovery, subscription and `transfers` triggered transfers,
/// returning each outcome in order.
pub async fn run_session(
    config: &CliConfig,
    image: Bytes,
    transfers: usize,
) -> Result<Vec<TransferOutcome>, LinkError> {
    let limit = Duration::from_secs(config.output.session_timeout_secs.max(1));
    let (handle, inbox) = engine_channel();
    let peripheral = SimPeripheral::new(config.to_sim_config(image), handle.clone());
    peripheral.power_on()?;
    let (obs_tx, mut events) = mpsc::unbounded_channel();
    let task = LinkEngine::new(config.to_engine_config(), peripheral, obs_tx, inbox).spawn_task();

    let session = async {
        handle.start()?;
        let mut outcomes = Vec::with_capacity(transfers);
        while outcomes.len() < transfers {
            let Some(event) = events.recv().await else {
                return Err(LinkError::ChannelClosed);
            };
            match event {
                ObserverEvent::StateChanged(state) => {
                    info!("state: {state}");
                    if state == ConnectionState::Subscribed {
                        handle.request_transfer()?;
                    }
                }
                ObserverEvent::Status(text) => info!("status: {text}"),
                ObserverEvent::Outcome(outcome) => {
                    outcomes.push(outcome);
                    if outcomes.len() < transfers {
                        handle.request_transfer()?;
                    }
                }
            }
        }
        Ok::<_, LinkError>(outcomes)
    };

    let result = match tokio::time::timeout(limit, session).await {
        Ok(result) => result,
        Err(_) => {
            warn!("session did not finish within {limit:?}");
            Err(LinkError::Other("simulated session timed out".into()))
        }
    };

    handle.shutdown()?;
    if let Err(e) = task.await {
        warn!("engine task ended abnormally: {e}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jpeg() -> Bytes {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend(std::iter::repeat_n(0x42, 700));
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        Bytes::from(jpeg)
    }

    #[tokio::test(start_paused = true)]
    async fn session_returns_each_outcome() {
        let jpeg = sample_jpeg();
        let outcomes = run_session(&CliConfig::default(), jpeg.clone(), 2)
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                TransferOutcome::Success(jpeg.clone()),
                TransferOutcome::Success(jpeg)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn truncated_session_reports_invalid() {
        let mut config = CliConfig::default();
        config.simulator.truncate_tail = 1;
        let outcomes = run_session(&config, sample_jpeg(), 1).await.unwrap();
        assert!(matches!(outcomes[..], [TransferOutcome::Invalid(_)]));
    }
}
