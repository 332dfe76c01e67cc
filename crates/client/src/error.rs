use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("API base URL is not configured"))]
    MissingBaseUrl { stage: &'static str },
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {url} failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("request to {url} was rejected with status {status}: {message}"))]
    Status {
        stage: &'static str,
        url: String,
        status: u16,
        message: String,
    },
    #[snafu(display("session is missing or expired: {message}"))]
    Unauthorized {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("failed to decode response body on `{stage}`: {source}"))]
    DecodeBody {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;
