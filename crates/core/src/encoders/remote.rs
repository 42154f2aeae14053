use crate::embeddings::{normalize, CrossModalEncoder, TextEncoder};
use crate::error::EmbedError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use crate::encoders::encode_png;
use image::RgbImage;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Client for an embedding server exposing `POST {endpoint}/text` and
/// `POST {endpoint}/image`.
pub struct RemoteEncoder {
    endpoint: String,
    api_key: Option<String>,
    dimensions: usize,
    client: Client,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    images: Vec<String>,
}

impl RemoteEncoder {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Result<Self, EmbedError> {
        let parsed = Url::parse(endpoint.trim())?;
        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            api_key,
            dimensions,
            client: Client::new(),
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        route: &str,
        body: &T,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/{route}", self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EmbedError::Request(format!(
                "embedding request to {url} returned {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        let mut vectors = parse_embeddings(&payload)?;
        if vectors.len() != expected {
            return Err(EmbedError::Response {
                details: format!("expected {expected} vectors, got {}", vectors.len()),
            });
        }

        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }

    async fn embed_text_route(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.post("text", &TextRequest { input: texts }, texts.len())
            .await
    }
}

/// Accepts `{"embeddings": [[..]]}` or `{"data": [{"embedding": [..]}]}`.
fn parse_embeddings(payload: &Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let rows: Vec<&Value> = if let Some(rows) = payload.get("embeddings").and_then(Value::as_array)
    {
        rows.iter().collect()
    } else if let Some(data) = payload.get("data").and_then(Value::as_array) {
        data.iter()
            .map(|item| {
                item.get("embedding").ok_or_else(|| EmbedError::Response {
                    details: "data item without embedding".to_string(),
                })
            })
            .collect::<Result<_, _>>()?
    } else {
        return Err(EmbedError::Response {
            details: "missing embeddings array".to_string(),
        });
    };

    rows.into_iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| EmbedError::Response {
                    details: "embedding is not an array".to_string(),
                })
                .and_then(|values| {
                    values
                        .iter()
                        .map(|value| {
                            value.as_f64().map(|number| number as f32).ok_or_else(|| {
                                EmbedError::Response {
                                    details: format!("non-numeric embedding value {value}"),
                                }
                            })
                        })
                        .collect()
                })
        })
        .collect()
}

fn encode_png_base64(image: &RgbImage) -> Result<String, EmbedError> {
    Ok(STANDARD.encode(encode_png(image)?))
}

#[async_trait]
impl TextEncoder for RemoteEncoder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.embed_text_route(texts).await
    }
}

#[async_trait]
impl CrossModalEncoder for RemoteEncoder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = images
            .iter()
            .map(encode_png_base64)
            .collect::<Result<Vec<_>, _>>()?;
        self.post("image", &ImageRequest { images: encoded }, images.len())
            .await
    }

    async fn embed_text_for_image_space(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.embed_text_route(texts).await
    }
}
