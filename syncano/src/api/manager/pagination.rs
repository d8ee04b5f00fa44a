//! Page-by-page evaluation of list queries
//!
//! A stream fetches the first page when first polled and requests the
//! backend's opaque `next` reference only once every buffered object has been
//! consumed. The client-side limit caps the total across pages, independent
//! of the server page size. Each stream is single-use; call
//! [`Manager::stream`] again for a fresh evaluation.

use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;

use super::{Item, Manager};
use crate::api::connection::RequestOptions;
use crate::api::error::Result;
use crate::api::metadata::ModelMeta;

/// Lazily evaluated sequence of list results
pub type ItemStream = BoxStream<'static, Result<Item>>;

/// One list response: `{"objects": [...], "next": "..."}`
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub objects: Vec<Value>,
    pub next: Option<String>,
}

impl Page {
    /// Split a decoded body into a page, handing back bodies without a
    /// pagination envelope
    ///
    /// A body is a page when it carries an `objects` array or a `next` key;
    /// `next` is optional on the last page.
    pub fn try_from_value(value: Value) -> std::result::Result<Page, Value> {
        match value {
            Value::Object(mut body) if is_envelope(&body) => {
                let objects = match body.remove("objects") {
                    Some(Value::Array(objects)) => objects,
                    _ => Vec::new(),
                };
                let next = match body.remove("next") {
                    Some(Value::String(next)) if !next.is_empty() => Some(next),
                    _ => None,
                };
                Ok(Page { objects, next })
            }
            other => Err(other),
        }
    }

    pub fn into_value(self) -> Value {
        let mut body = Map::new();
        body.insert("objects".to_string(), Value::Array(self.objects));
        body.insert(
            "next".to_string(),
            self.next.map(Value::String).unwrap_or(Value::Null),
        );
        Value::Object(body)
    }
}

fn is_envelope(body: &Map<String, Value>) -> bool {
    body.contains_key("next") || matches!(body.get("objects"), Some(Value::Array(_)))
}

struct PageState {
    manager: Manager,
    model: Option<Arc<ModelMeta>>,
    buffer: VecDeque<Value>,
    next: Option<String>,
    last_page_empty: bool,
    started: bool,
    results: usize,
}

impl PageState {
    fn limit_reached(&self) -> bool {
        self.manager.limit.is_some_and(|limit| self.results >= limit)
    }

    async fn serialize(&mut self, raw: Value) -> Result<Item> {
        if !self.manager.serialize {
            return Ok(Item::Raw(raw));
        }

        let model = match &self.model {
            Some(model) => model.clone(),
            None => {
                let model = self.manager.resolve_model().await?;
                self.model = Some(model.clone());
                model
            }
        };

        Ok(self.manager.serialize_with(raw, &model))
    }
}

pub(crate) fn paginate(manager: Manager) -> ItemStream {
    let state = PageState {
        manager,
        model: None,
        buffer: VecDeque::new(),
        next: None,
        last_page_empty: false,
        started: false,
        results: 0,
    };

    futures::stream::try_unfold(state, next_item).boxed()
}

async fn next_item(mut state: PageState) -> Result<Option<(Item, PageState)>> {
    loop {
        if state.limit_reached() {
            return Ok(None);
        }

        if let Some(raw) = state.buffer.pop_front() {
            state.results += 1;
            let item = state.serialize(raw).await?;
            return Ok(Some((item, state)));
        }

        let path = if state.started {
            match (&state.next, state.last_page_empty) {
                (Some(next), false) => Some(next.clone()),
                _ => return Ok(None),
            }
        } else {
            None
        };
        state.started = true;

        let body = state
            .manager
            .send(None, path.as_deref(), RequestOptions::new())
            .await?;

        match Page::try_from_value(body) {
            Ok(page) => {
                state.last_page_empty = page.objects.is_empty();
                state.next = page.next;
                state.buffer.extend(page.objects);
            }
            Err(single) => {
                state.last_page_empty = true;
                state.next = None;
                state.buffer.push_back(single);
            }
        }
    }
}
