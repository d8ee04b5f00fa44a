//! Lazy query and mutation builder
//!
//! A [`Manager`] accumulates a pending operation against one model. Chainable
//! methods take `&self` and return a new manager, so building on a manager
//! never changes it. Nothing is sent until a terminal operation (`get`,
//! `create`, `stream`, `fetch_all`, ...) runs.
//!
//! ```rust,ignore
//! let books = object()
//!     .please()
//!     .list(["library", "books"])
//!     .resolve_class()
//!     .await?
//!     .filter([("pages__gt", 100)])?
//!     .order_by("title")?
//!     .limit(20)?;
//!
//! let mut stream = books.stream();
//! while let Some(book) = stream.try_next().await? {
//!     println!("{:?}", book.get("title"));
//! }
//! ```

pub mod filters;
pub mod pagination;
pub mod schema;

pub use filters::Lookup;
pub use pagination::{ItemStream, Page};
pub use schema::{SchemaField, SchemaManager};

use futures::TryStreamExt;
use log::debug;
use serde_json::{Map, Value};
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use super::connection::{Connection, RequestOptions, default_connection};
use super::error::{Error, Result};
use super::metadata::{ModelKind, ModelMeta, class_name, registry};
use super::record::Record;
use super::transport::Method;

const LIST: &str = "list";
const DETAIL: &str = "detail";
const RUN: &str = "run";

/// Positional and named arguments for manager operations
///
/// Positional values are mapped, in order, onto the path parameters of the
/// endpoint being called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Map<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<Map<String, Value>> for Args {
    fn from(named: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            named,
        }
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Map::new(),
        }
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Args {
    fn from(values: [V; N]) -> Self {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: Map::new(),
        }
    }
}

/// One result: a model record, or decoded JSON in raw mode
#[derive(Debug, Clone)]
pub enum Item {
    Record(Record),
    Raw(Value),
}

impl Item {
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Item::Record(record) => record.get(field),
            Item::Raw(value) => value.get(field),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Item::Record(record) => Some(record),
            Item::Raw(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Item::Record(record) => Some(record),
            Item::Raw(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Item::Record(record) => Value::Object(record.into_fields()),
            Item::Raw(value) => value,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Item::Raw(_))
    }
}

/// Outcome of [`Manager::request`]
#[derive(Debug, Clone)]
pub enum Response {
    /// Single object, already deserialized
    Item(Item),
    /// Paginated list body, left for the stream to consume
    Page(Page),
}

/// Chainable query/mutation builder bound to one model
#[derive(Debug, Clone)]
pub struct Manager {
    model: Arc<ModelMeta>,
    endpoint: Option<String>,
    properties: Map<String, Value>,
    method: Option<Method>,
    query: Map<String, Value>,
    data: Map<String, Value>,
    limit: Option<usize>,
    serialize: bool,
    connection: Option<Arc<Connection>>,
}

impl std::fmt::Display for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Manager: {}>", self.model.name)
    }
}

impl Manager {
    pub fn new(model: Arc<ModelMeta>) -> Self {
        Self {
            model,
            endpoint: None,
            properties: Map::new(),
            method: None,
            query: Map::new(),
            data: Map::new(),
            limit: None,
            serialize: true,
            connection: None,
        }
    }

    pub fn model(&self) -> &Arc<ModelMeta> {
        &self.model
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn is_raw(&self) -> bool {
        !self.serialize
    }

    /// Bound connection, falling back to the process-wide default
    pub fn connection(&self) -> Result<Arc<Connection>> {
        match &self.connection {
            Some(connection) => Ok(connection.clone()),
            None => default_connection().get(),
        }
    }

    fn apply_args(&mut self, args: Args) {
        if !args.positional.is_empty() {
            if let Some(endpoint) = &self.endpoint {
                let names = self.model.endpoint_properties(endpoint);
                for (name, value) in names.iter().zip(args.positional) {
                    self.properties.insert(name.clone(), value);
                }
            }
        }
        self.properties.extend(args.named);
    }

    fn with_endpoint(&self, method: Method, endpoint: &str, args: Args) -> Manager {
        let mut manager = self.clone();
        manager.method = Some(method);
        manager.endpoint = Some(endpoint.to_string());
        manager.apply_args(args);
        manager
    }

    // Chainable operations

    /// Restrict a list query with `<field>__<lookup>` predicates
    pub fn filter<I, K, V>(&self, lookups: I) -> Result<Manager>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let built = filters::build_query(
            &self.model,
            lookups.into_iter().map(|(k, v)| (k.into(), v.into())),
        )?;

        let mut manager = self.clone();
        // Predicates accumulate across calls instead of replacing the previous query
        let query = manager
            .query
            .entry("query")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(existing) = query {
            for (field, conditions) in built {
                let entry = existing
                    .entry(field)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let (Value::Object(current), Value::Object(new)) = (entry, conditions) {
                    current.extend(new);
                }
            }
        }

        manager.method = Some(Method::Get);
        manager.endpoint = Some(LIST.to_string());
        Ok(manager)
    }

    /// Number of objects the backend returns per page
    pub fn page_size(&self, value: usize) -> Result<Manager> {
        if value == 0 {
            return Err(Error::validation("page_size value needs to be a positive int."));
        }

        let mut manager = self.clone();
        manager.query.insert("page_size".to_string(), Value::from(value));
        Ok(manager)
    }

    /// Cap on the total number of results across all pages
    pub fn limit(&self, value: usize) -> Result<Manager> {
        if value == 0 {
            return Err(Error::validation("Limit value needs to be a positive int."));
        }

        let mut manager = self.clone();
        manager.limit = Some(value);
        Ok(manager)
    }

    pub fn order_by(&self, field: &str) -> Result<Manager> {
        if field.trim().is_empty() {
            return Err(Error::validation("Order by field needs to be a non-empty string."));
        }

        let mut manager = self.clone();
        manager
            .query
            .insert("order_by".to_string(), Value::String(field.to_string()));
        Ok(manager)
    }

    /// Yield decoded JSON instead of records
    pub fn raw(&self) -> Manager {
        let mut manager = self.clone();
        manager.serialize = false;
        manager
    }

    /// Use `connection` for this chain only
    pub fn using(&self, connection: Arc<Connection>) -> Manager {
        let mut manager = self.clone();
        manager.connection = Some(connection);
        manager
    }

    /// Lazy list query; evaluate with [`stream`](Self::stream) or
    /// [`fetch_all`](Self::fetch_all)
    pub fn list(&self, args: impl Into<Args>) -> Manager {
        self.with_endpoint(Method::Get, LIST, args.into())
    }

    /// Like [`list`](Self::list) with any limit removed
    pub fn all(&self, args: impl Into<Args>) -> Manager {
        let mut manager = self.list(args);
        manager.limit = None;
        manager
    }

    /// Lazy GET against the named endpoint; unknown endpoints and `list` fall
    /// back to [`all`](Self::all)
    pub fn for_endpoint(&self, endpoint: &str, args: impl Into<Args>) -> Manager {
        if endpoint != LIST && self.model.endpoints.contains_key(endpoint) {
            self.with_endpoint(Method::Get, endpoint, args.into())
        } else {
            self.all(args)
        }
    }

    /// Bind to the model synthesized for the `(instance_name, class_name)`
    /// properties; a no-op for other model kinds
    pub async fn resolve_class(&self) -> Result<Manager> {
        let model = self.resolve_model().await?;
        let mut manager = self.clone();
        manager.model = model;
        Ok(manager)
    }

    // Object actions

    /// Build a record from `fields` plus bound properties and save it
    pub async fn create(&self, fields: Map<String, Value>) -> Result<Record> {
        let mut attrs = fields;
        attrs.extend(self.properties.clone());

        let model = self.model_for(&attrs).await?;
        let connection = self.connection()?;

        let mut record = Record::new(model, attrs);
        record.save(&connection).await?;
        Ok(record)
    }

    /// Create records one at a time
    ///
    /// Not meant for large datasets: there is no batching, and the first
    /// failure aborts the rest while earlier creations stay committed.
    pub async fn bulk_create(&self, objects: Vec<Map<String, Value>>) -> Result<Vec<Record>> {
        let mut created = Vec::with_capacity(objects.len());
        for fields in objects {
            created.push(self.create(fields).await?);
        }
        Ok(created)
    }

    /// Fetch one object; 404 becomes [`Error::DoesNotExist`]
    pub async fn get(&self, args: impl Into<Args>) -> Result<Item> {
        let manager = self.with_endpoint(Method::Get, DETAIL, args.into());
        match manager.request(None, None, RequestOptions::new()).await? {
            Response::Item(item) => Ok(item),
            Response::Page(page) => Ok(Item::Raw(page.into_value())),
        }
    }

    pub async fn detail(&self, args: impl Into<Args>) -> Result<Item> {
        self.get(args).await
    }

    /// Fetch one object, creating it from `defaults` plus the lookup
    /// arguments when it does not exist
    pub async fn get_or_create(&self, args: impl Into<Args>, defaults: Map<String, Value>) -> Result<Item> {
        let args = args.into();
        match self.get(args.clone()).await {
            Err(Error::DoesNotExist { .. }) => {
                let mut attrs = defaults;
                attrs.extend(self.detail_properties(args));
                self.create(attrs).await.map(Item::Record)
            }
            other => other,
        }
    }

    /// PUT `data` to one object
    pub async fn update(&self, args: impl Into<Args>, data: Map<String, Value>) -> Result<Item> {
        let mut manager = self.with_endpoint(Method::Put, DETAIL, args.into());
        manager.data = data;
        match manager.request(None, None, RequestOptions::new()).await? {
            Response::Item(item) => Ok(item),
            Response::Page(page) => Ok(Item::Raw(page.into_value())),
        }
    }

    /// Update one object, creating it from `defaults`, the lookup arguments
    /// and `data` when it does not exist
    pub async fn update_or_create(
        &self,
        args: impl Into<Args>,
        data: Map<String, Value>,
        defaults: Map<String, Value>,
    ) -> Result<Item> {
        let args = args.into();
        match self.update(args.clone(), data.clone()).await {
            Err(Error::DoesNotExist { .. }) => {
                let mut attrs = defaults;
                attrs.extend(self.detail_properties(args));
                attrs.extend(data);
                self.create(attrs).await.map(Item::Record)
            }
            other => other,
        }
    }

    /// DELETE one object
    pub async fn delete(&self, args: impl Into<Args>) -> Result<()> {
        let manager = self.with_endpoint(Method::Delete, DETAIL, args.into());
        manager.send(None, None, RequestOptions::new()).await?;
        Ok(())
    }

    /// Trigger a webhook and return its raw result
    pub async fn run(&self, args: impl Into<Args>) -> Result<Value> {
        if self.model.kind != ModelKind::Webhook {
            return Err(Error::validation(format!(
                "Model {} cannot be run.",
                self.model.name
            )));
        }

        let mut manager = self.with_endpoint(Method::Get, RUN, args.into());
        manager.serialize = false;
        manager.send(None, None, RequestOptions::new()).await
    }

    fn detail_properties(&self, args: Args) -> Map<String, Value> {
        let mut manager = self.clone();
        manager.endpoint = Some(DETAIL.to_string());
        manager.properties = Map::new();
        manager.apply_args(args);
        manager.properties
    }

    // List evaluation

    /// Fresh single-use stream over the query results
    pub fn stream(&self) -> ItemStream {
        let mut manager = self.clone();
        if manager.endpoint.is_none() {
            manager.endpoint = Some(LIST.to_string());
            manager.method = Some(Method::Get);
        }
        pagination::paginate(manager)
    }

    pub async fn fetch_all(&self) -> Result<Vec<Item>> {
        self.stream().try_collect().await
    }

    /// First matching object, if any
    pub async fn first(&self, args: impl Into<Args>) -> Result<Option<Item>> {
        let mut manager = self.list(args);
        manager.limit = Some(1);
        manager.nth(0).await
    }

    /// Object at `index`; fetches `index + 1` results
    pub async fn nth(&self, index: usize) -> Result<Option<Item>> {
        let manager = match index.checked_add(1) {
            Some(limit) => self.limit(limit)?,
            None => self.clone(),
        };
        let items = manager.fetch_all().await?;
        Ok(items.into_iter().nth(index))
    }

    /// Objects in `range`; a bounded range fetches `stop + 1` results
    pub async fn slice(&self, range: impl RangeBounds<usize>) -> Result<Vec<Item>> {
        let start = match range.start_bound() {
            Bound::Included(start) => *start,
            Bound::Excluded(start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(end) => end.checked_add(1),
            Bound::Excluded(end) => Some(*end),
            Bound::Unbounded => None,
        };

        // A stop at the top of the range fetches without a limit
        let manager = match stop.and_then(|stop| stop.checked_add(1)) {
            Some(limit) => self.limit(limit)?,
            None => self.clone(),
        };
        let items = manager.fetch_all().await?;

        let take = stop.map_or(usize::MAX, |stop| stop.saturating_sub(start));
        Ok(items.into_iter().skip(start).take(take).collect())
    }

    // Request plumbing

    /// Send the pending request
    ///
    /// Single objects come back deserialized; paginated bodies are returned
    /// as a [`Page`].
    pub async fn request(
        &self,
        method: Option<Method>,
        path: Option<&str>,
        options: RequestOptions,
    ) -> Result<Response> {
        let body = self.send(method, path, options).await?;
        match Page::try_from_value(body) {
            Ok(page) => Ok(Response::Page(page)),
            Err(single) => Ok(Response::Item(self.serialize(single).await?)),
        }
    }

    pub(crate) async fn send(
        &self,
        method: Option<Method>,
        path: Option<&str>,
        mut options: RequestOptions,
    ) -> Result<Value> {
        let method = method
            .or(self.method)
            .ok_or_else(|| Error::validation("Request method is not set."))?;

        let path = match path {
            Some(path) => path.to_string(),
            None => {
                let endpoint = self
                    .endpoint
                    .as_deref()
                    .ok_or_else(|| Error::validation("Request endpoint is not set."))?;
                self.model.resolve_endpoint(endpoint, &self.properties)?
            }
        };

        if options.params.is_none() && !self.query.is_empty() {
            options.params = Some(self.query.clone());
        }
        if options.data.is_none() && !self.data.is_empty() {
            options.data = Some(Value::Object(self.data.clone()));
        }

        let connection = self.connection()?;
        match connection.request(method, &path, options).await {
            Err(Error::Request { status: 404, .. }) if self.endpoint.as_deref() != Some(LIST) => {
                Err(Error::DoesNotExist {
                    model: self.model.name.clone(),
                })
            }
            other => other,
        }
    }

    /// Turn one decoded object into an [`Item`]
    pub async fn serialize(&self, data: Value) -> Result<Item> {
        if !self.serialize {
            return Ok(Item::Raw(data));
        }
        let model = self.resolve_model().await?;
        Ok(self.serialize_with(data, &model))
    }

    pub(crate) fn serialize_with(&self, data: Value, model: &Arc<ModelMeta>) -> Item {
        match data {
            Value::Object(fields) if self.serialize => {
                let mut merged = self.properties.clone();
                merged.extend(fields);
                Item::Record(Record::from_response(model.clone(), merged))
            }
            other => Item::Raw(other),
        }
    }

    /// Concrete model for results of this manager
    pub async fn resolve_model(&self) -> Result<Arc<ModelMeta>> {
        self.model_for(&self.properties).await
    }

    async fn model_for(&self, properties: &Map<String, Value>) -> Result<Arc<ModelMeta>> {
        match self.model.kind {
            ModelKind::Object => self.get_class_model(properties).await,
            _ => Ok(self.model.clone()),
        }
    }

    /// Model synthesized for an `(instance_name, class_name)` pair
    async fn get_class_model(&self, properties: &Map<String, Value>) -> Result<Arc<ModelMeta>> {
        let instance_name = property_str(properties, "instance_name");
        let class = property_str(properties, "class_name");
        let model_name = class_name(&[instance_name.as_str(), class.as_str(), "object"]);

        if self.model.name == model_name {
            return Ok(self.model.clone());
        }

        registry()
            .get_or_try_insert_with(&model_name, || async {
                let schema = self.get_class_schema(&instance_name, &class).await?;
                debug!(
                    "Synthesized {} with {} schema fields",
                    model_name,
                    schema.len()
                );
                Ok(self.model.create_subclass(&model_name, schema.fields()))
            })
            .await
    }

    async fn get_class_schema(&self, instance_name: &str, class: &str) -> Result<SchemaManager> {
        let parent = self.model.parent.clone().ok_or_else(|| {
            Error::validation(format!("Model {} has no parent schema.", self.model.name))
        })?;

        let mut manager = Manager::new(parent);
        manager.connection = self.connection.clone();
        let manager = manager.with_endpoint(Method::Get, DETAIL, Args::from([instance_name, class]));

        let body = manager.send(None, None, RequestOptions::new()).await?;
        SchemaManager::from_value(body.get("schema").unwrap_or(&Value::Null))
    }
}

fn property_str(properties: &Map<String, Value>, name: &str) -> String {
    match properties.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
