//! In-crate test doubles for the completion client and search backends.

use recall_core::AppResult;
use recall_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::backends::{
    SimilaritySearch, ToolSearchBackend, ToolSearchRequest, ToolSearchResponse, VectorMatch,
};

type Handler = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// Completion client answering through a closure and recording every prompt.
pub struct FnLlm {
    handler: Handler,
    prompts: Mutex<Vec<String>>,
}

impl FnLlm {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for FnLlm {
    fn provider_name(&self) -> &str {
        "test"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let content = (self.handler)(request)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Pops scripted outcomes in order, then repeats `fallback`.
struct Script<T> {
    queue: Mutex<VecDeque<AppResult<T>>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    fn next(&self) -> AppResult<T> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Similarity search with scripted responses.
pub struct ScriptedVectorBackend {
    script: Script<Vec<VectorMatch>>,
    queries: Mutex<Vec<(String, String, usize)>>,
}

impl ScriptedVectorBackend {
    pub fn scripted(outcomes: Vec<AppResult<Vec<VectorMatch>>>) -> Arc<Self> {
        Arc::new(Self {
            script: Script {
                queue: Mutex::new(outcomes.into()),
                fallback: Vec::new(),
            },
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn always(matches: Vec<VectorMatch>) -> Arc<Self> {
        Arc::new(Self {
            script: Script {
                queue: Mutex::new(VecDeque::new()),
                fallback: matches,
            },
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// `(store_id, query, top_k)` per call
    pub fn queries(&self) -> Vec<(String, String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

impl fmt::Debug for ScriptedVectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedVectorBackend")
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait::async_trait]
impl SimilaritySearch for ScriptedVectorBackend {
    async fn search(&self, store_id: &str, query: &str, top_k: usize) -> AppResult<Vec<VectorMatch>> {
        self.queries
            .lock()
            .unwrap()
            .push((store_id.to_string(), query.to_string(), top_k));
        self.script.next()
    }
}

/// Tool-bound generation with scripted responses.
pub struct ScriptedToolBackend {
    script: Script<ToolSearchResponse>,
    requests: Mutex<Vec<ToolSearchRequest>>,
}

impl ScriptedToolBackend {
    pub fn scripted(outcomes: Vec<AppResult<ToolSearchResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Script {
                queue: Mutex::new(outcomes.into()),
                fallback: ToolSearchResponse::default(),
            },
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always(response: ToolSearchResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Script {
                queue: Mutex::new(VecDeque::new()),
                fallback: response,
            },
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ToolSearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl fmt::Debug for ScriptedToolBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedToolBackend")
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait::async_trait]
impl ToolSearchBackend for ScriptedToolBackend {
    async fn generate_with_search(&self, request: &ToolSearchRequest) -> AppResult<ToolSearchResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script.next()
    }
}
