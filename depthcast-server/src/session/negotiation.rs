use crate::media::FrameSubscription;
use crate::session::control_loop::CONTROL_CHANNEL_LABEL;
use crate::transport::{ControlChannelHandle, MediaDirection, RealtimeTransport};
use anyhow::{Context, Result};
use depthcast_core::ClientId;
use std::sync::Arc;

/// What a successful negotiation hands back to the session manager.
pub(crate) struct Negotiated {
    pub answer: String,
    pub control: ControlChannelHandle,
}

/// Reported by a negotiation task once it finishes, successfully or not.
pub(crate) struct NegotiationOutcome {
    pub client_id: ClientId,
    pub generation: u64,
    pub result: Result<Negotiated>,
}

/// Runs the answering side of an offer/answer exchange on `transport`.
///
/// The outgoing video is attached after the offer is applied so the offer's
/// video section is reused, and the control channel is only created once
/// the local answer is in place.
pub(crate) async fn negotiate(
    transport: Arc<dyn RealtimeTransport>,
    sdp: String,
    frames: FrameSubscription,
) -> Result<Negotiated> {
    transport
        .set_remote_description(sdp)
        .await
        .context("Failed to apply remote offer")?;

    transport
        .add_outgoing_media(frames)
        .await
        .context("Failed to attach video")?;

    // An unset direction would leave the video track unsent.
    let directions = transport.media_directions().await;
    for (index, direction) in directions.into_iter().enumerate() {
        if direction == MediaDirection::Unset {
            transport
                .set_media_direction(index, MediaDirection::SendRecv)
                .await?;
        }
    }

    let answer = transport
        .create_answer()
        .await
        .context("Failed to create answer")?;
    let answer = transport
        .set_local_description(answer)
        .await
        .context("Failed to apply local answer")?;

    let control = transport.create_data_channel(CONTROL_CHANNEL_LABEL).await?;

    Ok(Negotiated { answer, control })
}
