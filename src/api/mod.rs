pub mod client;
pub mod transport;
pub mod types;

pub use client::{ApiClient, ApiError, ApiResponse, Payload, Reply, RequestOptions, ResponseBody};
pub use transport::{
    ApiRequest, FilePart, HttpTransport, MultipartForm, RawResponse, RequestBody, Transport, Verb,
};
