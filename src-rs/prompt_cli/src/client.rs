use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use crate::models::{GenerationRequest, Health, Metadata, StatusResponse, SubmitResponse};

pub struct HTTPClient {
    pub base_url: String,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn submit(&self, req: &GenerationRequest) -> Result<SubmitResponse, String> {
        let resp = self
            .client
            .post(format!("{}/generate-prompt", self.base_url))
            .json(req)
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn status(&self, task_id: &str) -> Result<StatusResponse, String> {
        self.get(&format!("/task-status/{}", task_id))
    }

    pub fn metadata(&self) -> Result<Metadata, String> {
        self.get("/v1/metadata")
    }

    pub fn health(&self) -> Result<Health, String> {
        self.get("/v1/health")
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    if resp.status().is_success() {
        resp.json::<T>().map_err(|err| err.to_string())
    } else {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        Err(format!("http {}: {}", status.as_u16(), body))
    }
}
