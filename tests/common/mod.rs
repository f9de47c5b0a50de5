//! Common test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use sinmun::crawler::{ListingRequest, Transport};
use sinmun::utils::error::FetchError;

/// Create one listing entry as the API spells it
pub fn entry(article_id: &str, office_id: &str, title: &str) -> Value {
    json!({
        "articleId": article_id,
        "title": title,
        "summary": format!("{title} 요약"),
        "officeId": office_id,
        "officeName": "연합뉴스",
        "serviceTime": 1_700_000_000_i64
    })
}

/// Wrap entries in the double-encoded listing envelope
pub fn listing_body(code: u32, entries: Vec<Value>) -> String {
    let inner = json!({ "result": { code.to_string(): entries } }).to_string();
    json!({ "airsResult": inner }).to_string()
}

/// Listing body whose entries are `ids`, all from office 001
pub fn listing_with_ids(code: u32, ids: &[&str]) -> String {
    listing_body(
        code,
        ids.iter()
            .map(|id| entry(id, "001", &format!("기사 {id}")))
            .collect(),
    )
}

/// Scripted reply for one page
#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Fail,
}

/// Transport answering from a per-page script
///
/// Pages without a script entry answer with an empty entry list.
pub struct ScriptedTransport {
    code: u32,
    replies: HashMap<u32, Reply>,
    requested: Mutex<Vec<u32>>,
}

impl ScriptedTransport {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            replies: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn page(mut self, page: u32, ids: &[&str]) -> Self {
        self.replies
            .insert(page, Reply::Body(listing_with_ids(self.code, ids)));
        self
    }

    pub fn raw(mut self, page: u32, body: &str) -> Self {
        self.replies.insert(page, Reply::Body(body.to_string()));
        self
    }

    pub fn fail(mut self, page: u32) -> Self {
        self.replies.insert(page, Reply::Fail);
        self
    }

    /// Pages requested so far, sorted
    pub fn requested(&self) -> Vec<u32> {
        let mut pages = self.requested.lock().unwrap().clone();
        pages.sort_unstable();
        pages
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &ListingRequest) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(request.page);

        match self.replies.get(&request.page) {
            Some(Reply::Body(body)) => Ok(body.clone()),
            Some(Reply::Fail) => Err(FetchError::RetriesExhausted {
                url: format!("scripted://{}", request.page),
                attempts: 3,
            }),
            None => Ok(listing_with_ids(self.code, &[])),
        }
    }

    fn max_concurrency(&self) -> usize {
        4
    }
}
