//! Staging PUT / `__input_stream__`.
//!
//! Grounded on `examples/original_source/examples/streaming_put.py` and
//! `tests/unit/test_streaming_put.py::TestStreamingPut`: the server's statement response, for a
//! staging `PUT '__input_stream__' ...` operation, is a single row naming a presigned URL and
//! headers to PUT the caller-supplied stream to.

use bytes::Bytes;

use crate::error::Error;

/// The one row a staging-operation result set yields, describing where to send the stream.
#[derive(Debug, Clone)]
pub struct StagingPutTarget {
    pub presigned_url: String,
    pub headers: Vec<(String, String)>,
}

/// Presence of the `'__input_stream__'` placeholder is a syntactic property of the submitted
/// SQL text, independent of backend.
#[must_use]
pub fn is_staging_input_stream(sql: &str) -> bool {
    sql.contains("__input_stream__")
}

/// PUTs `body` to the presigned URL the server returned. HTTP failures raise `OperationalError`; absence of a stream is checked by the caller
/// before this is reached and raises `ProgrammingError`.
pub async fn put_stream(
    client: &reqwest::Client,
    target: &StagingPutTarget,
    body: Bytes,
) -> Result<(), Error> {
    let mut request = client.put(&target.presigned_url);
    for (name, value) in &target.headers {
        request = request.header(name, value);
    }

    let response = request.body(body).send().await.map_err(Error::Http)?;
    if !response.status().is_success() {
        return Err(Error::operational(format!(
            "staging PUT to presigned URL failed with status {}",
            response.status()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_input_stream_placeholder() {
        assert!(is_staging_input_stream(
            "PUT '__input_stream__' INTO '/Volumes/c/s/v/f.txt' OVERWRITE"
        ));
        assert!(!is_staging_input_stream("SELECT 1"));
    }
}
