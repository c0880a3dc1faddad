/// Lazy, cursor-driven pagination over query and scan results
use crate::client::StoreClient;
use crate::executor::Executor;
use dynaq_core::{Document, Item, PageCursor, RequestPlan, Result};
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

/// One page of decoded items
#[derive(Debug, Clone, PartialEq)]
pub struct Page<D> {
    pub items: Vec<D>,
    /// Start of the next page, `None` on the last page
    pub cursor: Option<PageCursor>,
}

impl<D> Page<D> {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Opaque token for the next page
    pub fn next_token(&self) -> Option<String> {
        self.cursor.as_ref().map(PageCursor::token)
    }
}

/// Items of a query or scan, fetched one page at a time.
///
/// A store request is only made when the buffered page is used up. If a
/// page fetch fails the error is returned, the cursor stays on the last
/// page that was fetched successfully, and the next call fetches that page
/// again. An item that does not decode is returned as an error for that
/// item only.
pub struct ItemStream<C, D> {
    executor: Executor<C>,
    plan: RequestPlan,
    buffer: VecDeque<Item>,
    cursor: Option<PageCursor>,
    exhausted: bool,
    pages: usize,
    _marker: PhantomData<fn() -> D>,
}

impl<C, D> fmt::Debug for ItemStream<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStream")
            .field("shape", &self.plan.shape)
            .field("buffered", &self.buffer.len())
            .field("pages", &self.pages)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl<C: StoreClient, D: Document> ItemStream<C, D> {
    pub(crate) fn new(executor: Executor<C>, plan: RequestPlan) -> Self {
        Self {
            cursor: plan.cursor.clone(),
            executor,
            plan,
            buffer: VecDeque::new(),
            exhausted: false,
            pages: 0,
            _marker: PhantomData,
        }
    }

    /// Next item, or `None` once the last page is used up
    pub async fn try_next(&mut self) -> Result<Option<D>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return D::from_item(&item).map(Some);
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch().await?;
        }
    }

    async fn fetch(&mut self) -> Result<()> {
        let plan = self.plan.with_cursor(self.cursor.clone());
        let (items, next) = self.executor.fetch_items(&plan).await?;
        self.pages += 1;
        self.buffer.extend(items);
        self.exhausted = next.is_none();
        self.cursor = next;
        Ok(())
    }

    /// Cursor of the next page to fetch. Buffered items come before it.
    pub fn resume_cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// Drain the stream, stopping at the first error
    pub async fn collect_all(mut self) -> Result<Vec<D>> {
        let mut items = Vec::new();
        while let Some(item) = self.try_next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<D>> {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.try_next().await {
                Ok(Some(item)) => Some((Ok(item), stream)),
                Ok(None) => None,
                Err(e) => Some((Err(e), stream)),
            }
        })
    }
}
