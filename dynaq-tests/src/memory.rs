/// In-memory store speaking the `StoreClient` protocol
///
/// Tables are created from compiled shape descriptors. Requests are served
/// with the store's semantics: key conditions, filters applied after the
/// page limit, exclusive start keys, conditional writes, return values and
/// the batch size limits. Faults (throttling, unprocessed batch entries,
/// arbitrary errors) can be injected to exercise the engine's retry paths.

use crate::expression::{
    compare_values, ExpressionContext, ExpressionEvaluator, ExpressionParser, UpdateExpressionParser,
};
use async_trait::async_trait;
use dynaq_api::{StoreClient, StoreError, StoreRequest, StoreResponse};
use dynaq_core::schema::IndexKind;
use dynaq_core::{AttributeValue, Error, Item, Operation, RequestPlan, ReturnValues, ShapeDescriptor, WriteRequest};
use dynaq_core::builder::{MAX_BATCH_GET, MAX_BATCH_WRITE, MAX_TRANSACT_WRITE};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct KeySchema {
    partition: String,
    sort: Option<String>,
}

impl KeySchema {
    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition.as_str()).chain(self.sort.as_deref())
    }

    /// True if the item carries every key attribute (sparse index membership)
    fn covers(&self, item: &Item) -> bool {
        self.names().all(|name| item.contains_key(name))
    }
}

#[derive(Debug, Clone)]
struct IndexState {
    kind: IndexKind,
    keys: KeySchema,
}

#[derive(Debug, Clone)]
struct TableState {
    keys: KeySchema,
    indexes: HashMap<String, IndexState>,
    /// Insertion order; queries and scans sort their own view
    items: Vec<Item>,
}

impl TableState {
    fn position(&self, key: &Item) -> Option<usize> {
        self.items.iter().position(|item| {
            self.keys
                .names()
                .all(|name| cmp_attr(item.get(name), key.get(name)) == Ordering::Equal)
        })
    }

    /// Check a key names exactly the table's key attributes, each a scalar
    fn check_key(&self, key: &Item) -> Result<(), StoreError> {
        if key.len() != self.keys.names().count() {
            return Err(validation("key must contain exactly the table key attributes"));
        }
        self.check_key_attributes(key)
    }

    fn check_key_attributes(&self, item: &Item) -> Result<(), StoreError> {
        for name in self.keys.names() {
            match item.get(name) {
                Some(AttributeValue::S(_)) | Some(AttributeValue::N(_)) | Some(AttributeValue::B(_)) => {}
                Some(_) => return Err(validation(&format!("key attribute '{}' must be S, N or B", name))),
                None => return Err(validation(&format!("missing key attribute '{}'", name))),
            }
        }
        Ok(())
    }

    fn key_schema(&self, index: Option<&str>) -> Result<(&KeySchema, Option<&IndexState>), StoreError> {
        match index {
            None => Ok((&self.keys, None)),
            Some(name) => {
                let state = self
                    .indexes
                    .get(name)
                    .ok_or_else(|| validation(&format!("index '{}' does not exist", name)))?;
                Ok((&state.keys, Some(state)))
            }
        }
    }

    fn put(&mut self, item: Item) -> Option<Item> {
        match self.position(&item) {
            Some(pos) => Some(std::mem::replace(&mut self.items[pos], item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    fn remove(&mut self, key: &Item) -> Option<Item> {
        self.position(key).map(|pos| self.items.remove(pos))
    }
}

/// Injected failures, consumed in order
#[derive(Debug, Default)]
struct Faults {
    throttle: usize,
    errors: VecDeque<StoreError>,
    unprocessed: usize,
}

/// In-memory store for tests and examples
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, TableState>>,
    faults: Mutex<Faults>,
    requests: Mutex<Vec<StoreRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `create_table`
    pub fn with_table(self, descriptor: &ShapeDescriptor) -> Self {
        self.create_table(descriptor);
        self
    }

    /// Create the descriptor's table, or add its indexes to an existing one
    /// (several shapes may share a table).
    pub fn create_table(&self, descriptor: &ShapeDescriptor) {
        let mut tables = self.tables.lock();
        let table = tables.entry(descriptor.table.clone()).or_insert_with(|| TableState {
            keys: KeySchema {
                partition: descriptor.partition_key.clone(),
                sort: descriptor.sort_key.clone(),
            },
            indexes: HashMap::new(),
            items: Vec::new(),
        });
        for index in &descriptor.indexes {
            table.indexes.entry(index.name.clone()).or_insert_with(|| IndexState {
                kind: index.kind,
                keys: KeySchema {
                    partition: index.partition_key.clone(),
                    sort: index.sort_key.clone(),
                },
            });
        }
        debug!(table = %descriptor.table, shape = %descriptor.name, "created table");
    }

    /// Store an item directly, bypassing the request path
    pub fn insert(&self, table: &str, item: Item) {
        if let Some(state) = self.tables.lock().get_mut(table) {
            state.put(item);
        }
    }

    /// Stored items in insertion order
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.tables
            .lock()
            .get(table)
            .map(|state| state.items.clone())
            .unwrap_or_default()
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map(|state| state.items.len()).unwrap_or(0)
    }

    /// Fail the next `n` requests with a throttling error
    pub fn throttle_next(&self, n: usize) {
        self.faults.lock().throttle = n;
    }

    /// Fail the next request with `error`
    pub fn fail_next(&self, error: StoreError) {
        self.faults.lock().errors.push_back(error);
    }

    /// Leave the last `n` entries of the next batch call unprocessed
    pub fn leave_unprocessed(&self, n: usize) {
        self.faults.lock().unprocessed = n;
    }

    /// Every request received, including failed ones
    pub fn requests(&self) -> Vec<StoreRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn next_fault(&self) -> Option<StoreError> {
        let mut faults = self.faults.lock();
        if faults.throttle > 0 {
            faults.throttle -= 1;
            return Some(StoreError::Throttling("Rate of requests exceeds the allowed throughput".into()));
        }
        faults.errors.pop_front()
    }

    fn take_unprocessed(&self) -> usize {
        std::mem::take(&mut self.faults.lock().unprocessed)
    }

    fn handle(&self, request: &StoreRequest) -> Result<StoreResponse, StoreError> {
        self.requests.lock().push(request.clone());

        if let Some(err) = self.next_fault() {
            warn!(action = request.action(), error = %err, "injected fault");
            return Err(err);
        }

        let mut tables = self.tables.lock();
        if let Operation::TransactWrite { writes, .. } = &request.operation {
            debug!(action = request.action(), writes = writes.len(), "serving request");
            return transact(&mut tables, writes);
        }
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;
        let context = ExpressionContext::from_maps(
            &request.expression_attribute_names,
            &request.expression_attribute_values,
        );

        debug!(action = request.action(), table = %request.table, "serving request");

        match &request.operation {
            Operation::Get { key } => {
                table.check_key(key)?;
                let item = match table.position(key) {
                    Some(pos) => Some(project(&table.items[pos], request.projection_expression.as_deref(), &context)?),
                    None => None,
                };
                Ok(StoreResponse::with_item(item))
            }
            Operation::Query { key_condition } => query(table, request, key_condition, &context),
            Operation::Scan => scan(table, request, &context),
            Operation::Put { .. } | Operation::Update { .. } | Operation::Delete { .. } => {
                write_item(table, request, &context)
            }
            Operation::TransactWrite { .. } => Err(validation("transaction routed to a single table")),
            Operation::BatchGet { keys } => {
                if keys.is_empty() || keys.len() > MAX_BATCH_GET {
                    return Err(validation(&format!("BatchGetItem takes 1 to {} keys", MAX_BATCH_GET)));
                }
                let processed = keys.len() - self.take_unprocessed().min(keys.len());
                let mut items = Vec::new();
                for key in &keys[..processed] {
                    table.check_key(key)?;
                    if let Some(pos) = table.position(key) {
                        items.push(project(&table.items[pos], request.projection_expression.as_deref(), &context)?);
                    }
                }
                Ok(StoreResponse {
                    items,
                    unprocessed_keys: keys[processed..].to_vec(),
                    ..Default::default()
                })
            }
            Operation::BatchWrite { requests } => {
                if requests.is_empty() || requests.len() > MAX_BATCH_WRITE {
                    return Err(validation(&format!("BatchWriteItem takes 1 to {} requests", MAX_BATCH_WRITE)));
                }
                for entry in requests {
                    match entry {
                        WriteRequest::Put(item) => table.check_key_attributes(item)?,
                        WriteRequest::Delete(key) => table.check_key(key)?,
                    }
                }
                let processed = requests.len() - self.take_unprocessed().min(requests.len());
                for entry in &requests[..processed] {
                    match entry {
                        WriteRequest::Put(item) => {
                            table.put(item.clone());
                        }
                        WriteRequest::Delete(key) => {
                            table.remove(key);
                        }
                    }
                }
                Ok(StoreResponse {
                    unprocessed_writes: requests[processed..].to_vec(),
                    ..Default::default()
                })
            }
        }
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        self.handle(&request)
    }
}

/// PutItem, UpdateItem or DeleteItem against one table
fn write_item(table: &mut TableState, request: &StoreRequest, context: &ExpressionContext) -> Result<StoreResponse, StoreError> {
    match &request.operation {
        Operation::Put { item } => {
            table.check_key_attributes(item)?;
            let existing = table.position(item).map(|pos| table.items[pos].clone());
            check_condition(request.condition_expression.as_deref(), existing.as_ref(), context)?;
            let old = table.put(item.clone());
            let attributes = match request.return_values {
                ReturnValues::None => None,
                ReturnValues::AllOld => old,
                other => return Err(validation(&format!("PutItem does not support {}", other.as_str()))),
            };
            Ok(StoreResponse {
                attributes,
                ..Default::default()
            })
        }
        Operation::Update { key, update } => {
            table.check_key(key)?;
            let actions = UpdateExpressionParser::parse(update).map_err(invalid)?;
            let mut touched = Vec::with_capacity(actions.len());
            for action in &actions {
                let name = context.attribute_name(action.path()).map_err(invalid)?;
                if table.keys.names().any(|k| k == name) {
                    return Err(validation(&format!("cannot update key attribute '{}'", name)));
                }
                touched.push(name);
            }

            let existing = table.position(key).map(|pos| table.items[pos].clone());
            check_condition(request.condition_expression.as_deref(), existing.as_ref(), context)?;

            let base = existing.clone().unwrap_or_else(|| key.clone());
            let updated = crate::expression::UpdateExecutor::new(context)
                .execute(&base, &actions)
                .map_err(invalid)?;
            table.put(updated.clone());

            let attributes = match request.return_values {
                ReturnValues::None => None,
                ReturnValues::AllOld => existing,
                ReturnValues::AllNew => Some(updated),
                ReturnValues::UpdatedOld => existing.map(|old| project_names(&old, touched.iter().map(String::as_str))),
                ReturnValues::UpdatedNew => Some(project_names(&updated, touched.iter().map(String::as_str))),
            };
            Ok(StoreResponse {
                attributes,
                ..Default::default()
            })
        }
        Operation::Delete { key } => {
            table.check_key(key)?;
            let existing = table.position(key).map(|pos| table.items[pos].clone());
            check_condition(request.condition_expression.as_deref(), existing.as_ref(), context)?;
            let old = table.remove(key);
            let attributes = match request.return_values {
                ReturnValues::None => None,
                ReturnValues::AllOld => old,
                other => return Err(validation(&format!("DeleteItem does not support {}", other.as_str()))),
            };
            Ok(StoreResponse {
                attributes,
                ..Default::default()
            })
        }
        other => Err(validation(&format!("{} is not a single-item write", other.name()))),
    }
}

/// TransactWriteItems: every write is applied to a staged copy of the
/// tables, which replaces the live tables only if no condition failed.
fn transact(tables: &mut HashMap<String, TableState>, writes: &[RequestPlan]) -> Result<StoreResponse, StoreError> {
    if writes.is_empty() || writes.len() > MAX_TRANSACT_WRITE {
        return Err(validation(&format!("TransactWriteItems takes 1 to {} writes", MAX_TRANSACT_WRITE)));
    }
    let mut staged = tables.clone();
    let mut reasons = Vec::with_capacity(writes.len());
    for plan in writes {
        let request = StoreRequest::from_plan(plan);
        let table = staged.get_mut(&request.table).ok_or_else(|| table_not_found(&request.table))?;
        let context = ExpressionContext::from_maps(
            &request.expression_attribute_names,
            &request.expression_attribute_values,
        );
        match write_item(table, &request, &context) {
            Ok(_) => reasons.push(None),
            Err(StoreError::ConditionalCheckFailed(_)) => reasons.push(Some("ConditionalCheckFailed".to_string())),
            Err(e) => return Err(e),
        }
    }

    if reasons.iter().any(Option::is_some) {
        debug!(writes = writes.len(), "transaction canceled");
        return Err(StoreError::TransactionCanceled(reasons));
    }
    *tables = staged;
    Ok(StoreResponse::default())
}

fn table_not_found(table: &str) -> StoreError {
    StoreError::Service(format!("ResourceNotFoundException: table '{}' not found", table))
}

fn validation(message: &str) -> StoreError {
    StoreError::Service(format!("ValidationException: {}", message))
}

fn invalid(err: Error) -> StoreError {
    validation(&err.to_string())
}

/// Order of two key attribute values; absent sorts first, then by type tag
fn cmp_attr(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or_else(|| a.wire_type().tag().cmp(b.wire_type().tag())),
    }
}

fn cmp_by(a: &Item, b: &Item, order: &[String]) -> Ordering {
    order
        .iter()
        .map(|name| cmp_attr(a.get(name), b.get(name)))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn project_names<'a>(item: &Item, names: impl Iterator<Item = &'a str>) -> Item {
    names
        .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
        .collect()
}

fn project(item: &Item, projection: Option<&str>, context: &ExpressionContext) -> Result<Item, StoreError> {
    let Some(projection) = projection else {
        return Ok(item.clone());
    };
    let mut names = Vec::new();
    for path in projection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        names.push(context.attribute_name(path).map_err(invalid)?);
    }
    Ok(project_names(item, names.iter().map(String::as_str)))
}

fn check_condition(
    condition: Option<&str>,
    existing: Option<&Item>,
    context: &ExpressionContext,
) -> Result<(), StoreError> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let expr = ExpressionParser::parse(condition).map_err(invalid)?;
    let empty = Item::new();
    let item = existing.unwrap_or(&empty);
    if ExpressionEvaluator::new(item, context).evaluate(&expr).map_err(invalid)? {
        Ok(())
    } else {
        Err(StoreError::ConditionalCheckFailed("The conditional request failed".into()))
    }
}

fn passes(expr: Option<&crate::expression::Expr>, item: &Item, context: &ExpressionContext) -> Result<bool, StoreError> {
    match expr {
        Some(expr) => ExpressionEvaluator::new(item, context).evaluate(expr).map_err(invalid),
        None => Ok(true),
    }
}

/// Sort order for a table or index view: index keys first, then the table
/// key so ties within an index are stable.
fn view_order(table: &TableState, keys: &KeySchema) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for name in keys.names().chain(table.keys.names()) {
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
    }
    order
}

fn query(
    table: &TableState,
    request: &StoreRequest,
    key_condition: &str,
    context: &ExpressionContext,
) -> Result<StoreResponse, StoreError> {
    let (keys, index) = table.key_schema(request.index_name.as_deref())?;
    if request.consistent_read && matches!(index, Some(IndexState { kind: IndexKind::Global, .. })) {
        return Err(validation("consistent reads are not supported on global secondary indexes"));
    }
    let key_expr = ExpressionParser::parse(key_condition).map_err(invalid)?;

    let mut view = Vec::new();
    for item in table.items.iter().filter(|item| keys.covers(item)) {
        if passes(Some(&key_expr), item, context)? {
            view.push(item);
        }
    }

    let order = view_order(table, keys);
    view.sort_by(|a, b| cmp_by(a, b, &order));
    if !request.scan_index_forward {
        view.reverse();
    }
    page(view, &order, request, context)
}

fn scan(table: &TableState, request: &StoreRequest, context: &ExpressionContext) -> Result<StoreResponse, StoreError> {
    let (keys, index) = table.key_schema(request.index_name.as_deref())?;
    if request.consistent_read && matches!(index, Some(IndexState { kind: IndexKind::Global, .. })) {
        return Err(validation("consistent reads are not supported on global secondary indexes"));
    }
    if let Some(segment) = request.segment {
        if segment.total == 0 || segment.segment >= segment.total {
            return Err(validation("segment must be less than total segments"));
        }
    }

    let mut view: Vec<&Item> = table
        .items
        .iter()
        .filter(|item| keys.covers(item))
        .filter(|item| match request.segment {
            Some(segment) => segment_of(item.get(&table.keys.partition), segment.total) == segment.segment,
            None => true,
        })
        .collect();

    let order = view_order(table, keys);
    view.sort_by(|a, b| cmp_by(a, b, &order));
    page(view, &order, request, context)
}

/// Stable segment assignment from the partition key's value
fn segment_of(partition: Option<&AttributeValue>, total: u32) -> u32 {
    let text = match partition {
        Some(AttributeValue::S(s)) => s.as_bytes().to_vec(),
        Some(AttributeValue::N(n)) => n.as_str().as_bytes().to_vec(),
        Some(AttributeValue::B(b)) => b.to_vec(),
        _ => Vec::new(),
    };
    let hash = text
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3));
    (hash % u64::from(total)) as u32
}

/// Apply the exclusive start key, the limit and then the filter. The last
/// evaluated key is set only when evaluated items remain past the limit.
fn page(
    view: Vec<&Item>,
    order: &[String],
    request: &StoreRequest,
    context: &ExpressionContext,
) -> Result<StoreResponse, StoreError> {
    if request.limit == Some(0) {
        return Err(validation("limit must be greater than 0"));
    }

    let forward = request.scan_index_forward || request.operation == Operation::Scan;
    let remaining: Vec<&Item> = match &request.exclusive_start_key {
        Some(start) => view
            .into_iter()
            .filter(|item| {
                let o = cmp_by(item, start, order);
                if forward {
                    o == Ordering::Greater
                } else {
                    o == Ordering::Less
                }
            })
            .collect(),
        None => view,
    };

    let limit = request.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    let evaluated = &remaining[..limit.min(remaining.len())];
    let more = remaining.len() > evaluated.len();

    let filter = match &request.filter_expression {
        Some(filter) => Some(ExpressionParser::parse(filter).map_err(invalid)?),
        None => None,
    };

    let mut items = Vec::new();
    for item in evaluated {
        if passes(filter.as_ref(), item, context)? {
            items.push(project(item, request.projection_expression.as_deref(), context)?);
        }
    }

    let last_evaluated_key = if more {
        evaluated
            .last()
            .map(|item| project_names(item, order.iter().map(String::as_str)))
    } else {
        None
    };

    Ok(StoreResponse::with_items(items, last_evaluated_key))
}
