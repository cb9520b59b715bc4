use crate::LanguageModelError;
use eventsource_stream::Eventsource;
use futures::{stream::StreamExt, Stream};
use reqwest::{header::HeaderMap, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::pin::Pin;

/// Chunks parsed from a server-sent event stream.
pub type SseChunkStream<R> = Pin<Box<dyn Stream<Item = Result<R, LanguageModelError>> + Send>>;

/// Turns a non-success response into `LanguageModelError::StatusCode` with the
/// provider's error body.
async fn check_status(response: Response) -> Result<Response, LanguageModelError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LanguageModelError::StatusCode(
            status,
            response.text().await.unwrap_or_default(),
        ))
    }
}

/// POST a JSON body and parse the JSON response.
pub async fn send_json<T: Serialize, R: DeserializeOwned>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
) -> Result<R, LanguageModelError> {
    let response = client.post(url).headers(headers).json(data).send().await?;
    let response = check_status(response).await?;
    Ok(response.json::<R>().await?)
}

/// POST a JSON body whose response is an SSE stream of JSON chunks.
/// Empty events are skipped and a `[DONE]` event ends the stream.
pub async fn send_sse_stream<T: Serialize, R: DeserializeOwned + Send + 'static>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
    provider: &'static str,
) -> Result<SseChunkStream<R>, LanguageModelError> {
    let response = client.post(url).headers(headers).json(data).send().await?;
    let mut sse_stream = Box::pin(check_status(response).await?.bytes_stream().eventsource());

    let stream = async_stream::try_stream! {
        while let Some(event) = sse_stream.next().await {
            let event = event.map_err(|error| match error {
                eventsource_stream::EventStreamError::Utf8(_) => LanguageModelError::Invariant(
                    provider,
                    "Received invalid UTF-8 sequence in stream data".to_string(),
                ),
                eventsource_stream::EventStreamError::Parser(error) => {
                    LanguageModelError::Invariant(
                        provider,
                        format!("Received invalid EventStream data: {error}"),
                    )
                }
                eventsource_stream::EventStreamError::Transport(error) => {
                    LanguageModelError::Transport(error)
                }
            })?;

            if event.data.is_empty() {
                continue;
            }
            if event.data == "[DONE]" {
                break;
            }

            let chunk: R = serde_json::from_str(&event.data).map_err(|e| {
                LanguageModelError::Invariant(provider, format!("Failed to parse stream chunk: {e}"))
            })?;

            yield chunk;
        }
    };

    Ok(Box::pin(stream))
}
