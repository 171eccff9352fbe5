use reqwest::Response;

pub(crate) const MAX_BODY_BYTES: usize = 1024 * 1024;
pub(crate) const ERROR_EXCERPT_BYTES: usize = 1024;
pub(crate) const LLM_ERROR_EXCERPT_BYTES: usize = 4 * 1024;

/// Reads at most `limit` bytes of a response body, dropping the rest.
pub(crate) async fn read_limited(
    mut response: Response,
    limit: usize,
) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while body.len() < limit {
        let Some(chunk) = response.chunk().await? else {
            break;
        };
        let room = limit - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(body)
}

/// Best-effort excerpt of an error body; read failures yield an empty excerpt.
pub(crate) async fn excerpt(response: Response, limit: usize) -> Vec<u8> {
    read_limited(response, limit).await.unwrap_or_default()
}
